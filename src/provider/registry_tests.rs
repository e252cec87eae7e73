use super::*;

fn test_registry() -> ProviderRegistry {
    let client = kube::Client::try_from(kube::Config::new("https://127.0.0.1:1".parse().unwrap()))
        .expect("build offline client for resolver plumbing only");
    let resolver = ConfigVarResolver::new(client, "default");
    ProviderRegistry::new(HttpClient::new(), resolver)
}

#[test]
fn as_str_and_parse_round_trip_for_every_name() {
    for name in CloudProviderName::ALL {
        assert_eq!(CloudProviderName::parse(name.as_str()), Some(name));
    }
}

#[test]
fn parse_rejects_unknown_names() {
    assert_eq!(CloudProviderName::parse("not-a-real-cloud"), None);
}

#[test]
fn get_resolves_every_registered_provider_name() {
    let registry = test_registry();
    for name in CloudProviderName::ALL {
        registry.get("m1", name.as_str()).unwrap_or_else(|e| panic!("{} should resolve: {e}", name.as_str()));
    }
}

#[test]
fn get_rejects_unknown_provider_names() {
    let registry = test_registry();
    let err = registry.get("m1", "not-a-real-cloud").unwrap_err();
    assert!(matches!(err, ProviderError::InvalidConfig { .. }));
}
