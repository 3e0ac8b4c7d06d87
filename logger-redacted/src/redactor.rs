use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref EMAIL_REGEX: Option<Regex> = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").ok();
    static ref IPV4_REGEX: Option<Regex> = Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").ok();
}

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_ip_addresses: bool,
    /// Replace values with a short hash so records stay correlatable
    pub hash_for_correlation: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_ip_addresses: true,
            hash_for_correlation: false,
        }
    }
}

impl RedactionConfig {
    /// Pass everything through unchanged
    pub fn disabled() -> Self {
        Self {
            redact_emails: false,
            redact_ip_addresses: false,
            hash_for_correlation: false,
        }
    }
}

/// Masks emails and IPv4 addresses in strings before they are logged
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_emails {
            result = self.redact_emails(&result);
        }

        if self.config.redact_ip_addresses {
            result = self.redact_ip_addresses(&result);
        }

        result
    }

    fn redact_emails(&self, text: &str) -> String {
        let Some(ref regex) = *EMAIL_REGEX else {
            return text.to_string();
        };
        regex
            .replace_all(text, |caps: &regex::Captures| {
                let email = caps.get(0).map_or("", |m| m.as_str());
                if self.config.hash_for_correlation {
                    return format!("EMAIL[{}]", hash_value(email));
                }
                match email.split_once('@') {
                    Some((local, domain)) => format!("{}***@{}***", first_char(local), first_char(domain)),
                    None => "***@***".to_string(),
                }
            })
            .to_string()
    }

    fn redact_ip_addresses(&self, text: &str) -> String {
        let Some(ref regex) = *IPV4_REGEX else {
            return text.to_string();
        };
        regex
            .replace_all(text, |caps: &regex::Captures| {
                let ip = caps.get(0).map_or("", |m| m.as_str());
                if self.config.hash_for_correlation {
                    return format!("IP[{}]", hash_value(ip));
                }
                let mut octets = ip.split('.');
                match (octets.next(), octets.last()) {
                    (Some(first), Some(last)) => format!("{}.***.***.{}", first, last),
                    _ => "***.***.***.***".to_string(),
                }
            })
            .to_string()
    }
}

fn first_char(s: &str) -> &str {
    s.char_indices().nth(1).map_or(s, |(i, _)| &s[..i])
}

fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    // First 8 bytes keep the tag short
    general_purpose::STANDARD.encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_redaction() {
        let redactor = PiiRedactor::default();

        let redacted = redactor.redact("User john.doe@example.com logged in");
        assert_eq!(redacted, "User j***@e*** logged in");
    }

    #[test]
    fn test_ip_redaction() {
        let redactor = PiiRedactor::default();

        let redacted = redactor.redact("login from 192.168.1.100");
        assert_eq!(redacted, "login from 192.***.***.100");
    }

    #[test]
    fn test_hash_for_correlation() {
        let redactor = PiiRedactor::new(RedactionConfig {
            hash_for_correlation: true,
            ..Default::default()
        });

        let first = redactor.redact("ada@example.com");
        let second = redactor.redact("ada@example.com");
        assert!(first.starts_with("EMAIL["));
        assert!(!first.contains("ada"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_disabled_passes_through() {
        let redactor = PiiRedactor::new(RedactionConfig::disabled());
        assert_eq!(redactor.redact("ada@example.com 10.0.0.1"), "ada@example.com 10.0.0.1");
    }
}
