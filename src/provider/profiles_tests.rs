use super::*;
use serde_json::json;

#[test]
fn every_profile_name_round_trips_through_the_registry() {
    for name in CloudProviderName::ALL {
        if name == CloudProviderName::Fake {
            continue;
        }
        assert_eq!(CloudProviderName::parse(name.as_str()), Some(name));
    }
}

#[test]
fn default_matches_uid_reads_nested_tags() {
    let item = json!({"tags": {"machineUid": "abc"}});
    assert!(default_matches_uid(&item, "abc"));
    assert!(!default_matches_uid(&item, "xyz"));
}

#[test]
fn default_matches_uid_reads_flat_field_fallback() {
    let item = json!({"machineUid": "abc"});
    assert!(default_matches_uid(&item, "abc"));
}

#[test]
fn default_parse_instance_requires_an_id() {
    assert!(default_parse_instance(&json!({"name": "no-id"})).is_none());
}

#[test]
fn default_parse_instance_reads_addresses() {
    let item = json!({
        "id": "i-1",
        "name": "worker",
        "addresses": [{"type": "InternalIP", "address": "10.0.0.9"}],
    });
    let instance = default_parse_instance(&item).expect("parses");
    assert_eq!(instance.addresses.len(), 1);
    assert_eq!(instance.addresses[0].address, "10.0.0.9");
}

#[test]
fn digitalocean_profile_applies_default_droplet_size() {
    let profile = DigitalOceanProfile;
    let mut raw_config = json!({});
    profile.apply_defaults(&mut raw_config);
    assert_eq!(raw_config["size"], "s-2vcpu-4gb");
}

#[test]
fn hetzner_profile_does_not_override_an_explicit_server_type() {
    let profile = HetznerProfile;
    let mut raw_config = json!({"serverType": "cx32"});
    profile.apply_defaults(&mut raw_config);
    assert_eq!(raw_config["serverType"], "cx32");
}
