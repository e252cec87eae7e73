// SPDX-License-Identifier: Apache-2.0

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{default_backoff, is_retryable_error};
    use std::time::Duration;

    #[test]
    fn backoff_configuration() {
        let backoff = default_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(100), "Initial interval should be 100ms");
        assert_eq!(backoff.max_interval, Duration::from_secs(30), "Max interval should be 30 seconds");
        assert_eq!(
            backoff.max_elapsed_time,
            Some(Duration::from_secs(300)),
            "Max elapsed time should be 5 minutes"
        );

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(backoff.multiplier, 2.0, "Multiplier should be 2.0 for exponential growth");
            assert_eq!(backoff.randomization_factor, 0.1, "Randomization factor should be 0.1 (+/-10%)");
        }
    }

    #[test]
    fn http_429_is_retryable() {
        let err = kube::Error::Api(kube::error::ErrorResponse {
            status: "Too Many Requests".to_string(),
            message: "Rate limit exceeded".to_string(),
            reason: "TooManyRequests".to_string(),
            code: 429,
        });

        assert!(is_retryable_error(&err), "HTTP 429 (rate limiting) should be retryable");
    }

    #[test]
    fn http_5xx_is_retryable() {
        let err_500 = kube::Error::Api(kube::error::ErrorResponse {
            status: "Internal Server Error".to_string(),
            message: "Server error".to_string(),
            reason: "InternalServerError".to_string(),
            code: 500,
        });
        assert!(is_retryable_error(&err_500), "HTTP 500 should be retryable");

        let err_503 = kube::Error::Api(kube::error::ErrorResponse {
            status: "Service Unavailable".to_string(),
            message: "Service temporarily unavailable".to_string(),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
        });
        assert!(is_retryable_error(&err_503), "HTTP 503 should be retryable");

        let err_599 = kube::Error::Api(kube::error::ErrorResponse {
            status: "Server Error".to_string(),
            message: "Server error".to_string(),
            reason: "ServerError".to_string(),
            code: 599,
        });
        assert!(is_retryable_error(&err_599), "HTTP 599 should be retryable");
    }

    #[test]
    fn http_4xx_not_retryable() {
        let err_400 = kube::Error::Api(kube::error::ErrorResponse {
            status: "Bad Request".to_string(),
            message: "Invalid request".to_string(),
            reason: "BadRequest".to_string(),
            code: 400,
        });
        assert!(!is_retryable_error(&err_400), "HTTP 400 should not be retryable");

        let err_404 = kube::Error::Api(kube::error::ErrorResponse {
            status: "Not Found".to_string(),
            message: "Resource not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        assert!(!is_retryable_error(&err_404), "HTTP 404 should not be retryable");

        let err_401 = kube::Error::Api(kube::error::ErrorResponse {
            status: "Unauthorized".to_string(),
            message: "Authentication required".to_string(),
            reason: "Unauthorized".to_string(),
            code: 401,
        });
        assert!(!is_retryable_error(&err_401), "HTTP 401 should not be retryable");
    }

    #[test]
    fn service_errors_retryable() {
        let service_error: Box<dyn std::error::Error + Send + Sync> =
            Box::new(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection failed"));

        let err = kube::Error::Service(service_error);

        assert!(is_retryable_error(&err), "Service/network errors should be retryable");
    }

    #[test]
    fn backoff_timing_progression() {
        let backoff = default_backoff();

        let mut current = backoff.current_interval;
        assert_eq!(current, Duration::from_millis(100), "First retry at 100ms");

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            let current_millis = current.as_millis() as f64 * 2.0;
            current = Duration::from_millis(current_millis as u64);
        }
        assert!(
            current >= Duration::from_millis(180) && current <= Duration::from_millis(220),
            "Second retry should be ~200ms (+/-10%)"
        );
    }

    #[test]
    fn max_interval_capping() {
        let backoff = default_backoff();
        let max_interval = Duration::from_secs(30);

        let mut current = backoff.initial_interval;
        for _ in 0..20 {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                let current_millis_f64 = current.as_millis() as f64;
                current = Duration::from_millis((current_millis_f64 * 2.0) as u64);
            }
            if current > max_interval {
                current = max_interval;
            }
        }

        assert_eq!(current, max_interval, "After many retries, interval should cap at max");
    }

    #[test]
    fn max_elapsed_time_is_bounded() {
        let backoff = default_backoff();

        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(300)), "Max elapsed time should be 5 minutes");

        let max_secs = backoff.max_elapsed_time.unwrap().as_secs();
        assert!(max_secs >= 60, "Max elapsed time should be at least 1 minute");
        assert!(max_secs <= 600, "Max elapsed time should not exceed 10 minutes");
    }
}
