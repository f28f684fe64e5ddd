//! The question fingerprint used to key the cache and to drive suffix-tree lookups.

use std::str::FromStr;

use hickory_proto::op::Query;
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::ProtoError;
use md5::{Digest, Md5};

/// A normalized `(qname, qtype, qclass)` triple.
///
/// `qname` is lowercased and stripped of any trailing root label separator so
/// that `example.com` and `example.com.` fingerprint identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub qname: String,
    pub qtype: RecordType,
    pub qclass: DNSClass,
}

impl Question {
    pub fn new(qname: &str, qtype: RecordType, qclass: DNSClass) -> Self {
        Question {
            qname: unfqdn(qname).to_lowercase(),
            qtype,
            qclass,
        }
    }

    /// Whether this question is an address lookup in the Internet class, i.e.
    /// the kind the hosts table and the handler's short-circuit path apply to.
    pub fn is_ip_query(&self) -> bool {
        self.qclass == DNSClass::IN
            && matches!(self.qtype, RecordType::A | RecordType::AAAA)
    }

    /// The dot-separated labels of `qname`, in on-the-wire (left to right) order.
    pub fn labels(&self) -> Vec<&str> {
        if self.qname.is_empty() {
            Vec::new()
        } else {
            self.qname.split('.').collect()
        }
    }

    /// Build the wire `Query` this fingerprint was derived from, for
    /// constructing a standalone message (upstream dispatch, remote cache
    /// serialization).
    pub fn to_query(&self) -> Result<Query, ProtoError> {
        let name = Name::from_str(&self.qname)?;
        let mut query = Query::new();
        query.set_name(name);
        query.set_query_type(self.qtype);
        query.set_query_class(self.qclass);
        Ok(query)
    }

    /// A deterministic cache key: MD5 of `qname|qclass|qtype`.
    pub fn cache_key(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.qname.as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{:?}", self.qclass).as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{:?}", self.qtype).as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Strip a single trailing root-label dot, the way the original `UnFqdn` helper did.
pub fn unfqdn(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fqdn_and_bare_name_share_a_key() {
        let a = Question::new("example.com.", RecordType::A, DNSClass::IN);
        let b = Question::new("example.com", RecordType::A, DNSClass::IN);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn case_is_ignored() {
        let a = Question::new("Example.COM", RecordType::A, DNSClass::IN);
        let b = Question::new("example.com", RecordType::A, DNSClass::IN);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn different_type_different_key() {
        let a = Question::new("example.com", RecordType::A, DNSClass::IN);
        let b = Question::new("example.com", RecordType::AAAA, DNSClass::IN);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn is_ip_query_requires_in_class_and_address_type() {
        assert!(Question::new("x.com", RecordType::A, DNSClass::IN).is_ip_query());
        assert!(Question::new("x.com", RecordType::AAAA, DNSClass::IN).is_ip_query());
        assert!(!Question::new("x.com", RecordType::MX, DNSClass::IN).is_ip_query());
        assert!(!Question::new("x.com", RecordType::A, DNSClass::CH).is_ip_query());
    }

    #[test]
    fn labels_split_on_dot() {
        let q = Question::new("sub.example.com", RecordType::A, DNSClass::IN);
        assert_eq!(q.labels(), vec!["sub", "example", "com"]);
    }
}
