//! The upstream race: launches configured nameservers one at a time on a
//! staggered ticker and returns the first valid answer, letting slower
//! upstreams keep running to completion in the background rather than
//! cancelling them.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use crate::error::ResolveError;
use crate::suffix::SuffixTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub timeout: Duration,
    pub interval: Duration,
    pub set_edns0: bool,
    pub default_nameservers: Vec<SocketAddr>,
}

pub struct Resolver {
    settings: ResolverSettings,
    routes: SuffixTree<Vec<SocketAddr>>,
}

impl Resolver {
    pub fn new(settings: ResolverSettings, routes: SuffixTree<Vec<SocketAddr>>) -> Self {
        Resolver { settings, routes }
    }

    /// The nameserver list to consult for `qname`: a suffix-tree route if one
    /// matches, otherwise the configured default list.
    pub fn nameservers_for(&self, qname: &str) -> Vec<SocketAddr> {
        self.routes
            .search(qname)
            .cloned()
            .unwrap_or_else(|| self.settings.default_nameservers.clone())
    }

    /// Race `query` across the nameservers for its name, per the staggered
    /// launch algorithm, and return the first valid response.
    pub async fn resolve(&self, transport: Transport, query: &Query) -> Result<Message, ResolveError> {
        let qname = query.name().to_string();
        let nameservers = self.nameservers_for(&qname);
        if nameservers.is_empty() {
            return Err(ResolveError::no_nameservers(qname));
        }

        let (tx, mut rx) = tokio::sync::mpsc::channel::<Message>(1);
        let mut handles = Vec::with_capacity(nameservers.len());
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::from_std(Instant::now() + self.settings.interval), self.settings.interval);
        let mut winner: Option<Message> = None;

        for ns in &nameservers {
            let ns = *ns;
            let tx = tx.clone();
            let query = query.clone();
            let timeout = self.settings.timeout;
            let edns0 = self.settings.set_edns0;
            handles.push(tokio::spawn(async move {
                match tokio::time::timeout(timeout, exchange(transport, ns, &query, edns0)).await {
                    Ok(Ok(msg)) if is_valid(&msg) => {
                        let _ = tx.try_send(msg);
                    }
                    Ok(Ok(_)) => {
                        log::warn!("nameserver {} returned SERVFAIL for {}", ns, query.name());
                    }
                    Ok(Err(err)) => {
                        log::warn!("exchange with {} failed: {}", ns, err);
                    }
                    Err(_) => {
                        log::warn!("exchange with {} timed out", ns);
                    }
                }
            }));

            tokio::select! {
                maybe = rx.recv() => {
                    if let Some(msg) = maybe {
                        winner = Some(msg);
                    }
                }
                _ = ticker.tick() => {}
            }
            if winner.is_some() {
                break;
            }
        }

        if winner.is_none() {
            for handle in handles {
                let _ = handle.await;
            }
            winner = rx.try_recv().ok();
        }

        winner.ok_or_else(|| {
            ResolveError::failed(
                qname,
                nameservers.iter().map(|a| a.to_string()).collect(),
            )
        })
    }
}

/// A response is usable unless the upstream itself reported `ServFail`;
/// `NXDomain` and other codes are definitive, cacheable answers.
fn is_valid(message: &Message) -> bool {
    message.response_code() != ResponseCode::ServFail
}

/// Advertised UDP payload size when EDNS0 is enabled, matching the original
/// `req.SetEdns0(65535, true)` (resolver.go).
const EDNS0_MAX_PAYLOAD: u16 = 65535;

async fn exchange(
    transport: Transport,
    nameserver: SocketAddr,
    query: &Query,
    set_edns0: bool,
) -> std::io::Result<Message> {
    let mut message = Message::new();
    message.set_id(rand::thread_rng().gen());
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query.clone());

    if transport == Transport::Udp && set_edns0 {
        let mut edns = Edns::new();
        edns.set_max_payload(EDNS0_MAX_PAYLOAD);
        message.set_edns(edns);
    }

    match transport {
        Transport::Udp => exchange_udp(nameserver, &message, set_edns0).await,
        Transport::Tcp => exchange_tcp(nameserver, &message).await,
    }
}

async fn exchange_udp(
    nameserver: SocketAddr,
    message: &Message,
    set_edns0: bool,
) -> std::io::Result<Message> {
    let bind_addr: SocketAddr = if nameserver.is_ipv4() {
        "0.0.0.0:0".parse().unwrap()
    } else {
        "[::]:0".parse().unwrap()
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(nameserver).await?;

    let wire = message
        .to_vec()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    socket.send(&wire).await?;

    let bufsize = if set_edns0 { EDNS0_MAX_PAYLOAD as usize } else { 4096 };
    let mut buf = vec![0u8; bufsize];
    let n = socket.recv(&mut buf).await?;
    Message::from_vec(&buf[..n]).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

async fn exchange_tcp(nameserver: SocketAddr, message: &Message) -> std::io::Result<Message> {
    let mut stream = TcpStream::connect(nameserver).await?;
    let wire = message
        .to_vec()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let len = u16::try_from(wire.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "message too large for TCP framing"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&wire).await?;

    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let resp_len = u16::from_be_bytes(len_buf) as usize;
    let mut resp_buf = vec![0u8; resp_len];
    stream.read_exact(&mut resp_buf).await?;
    Message::from_vec(&resp_buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Parse a dnsmasq-style server-list file:
/// `server=/<domain>/<ip>` routes a domain to a specific upstream;
/// `server=<ip>[#<port>]` adds a default upstream. Blank lines, comments,
/// and malformed lines are skipped.
pub fn parse_server_list(text: &str) -> (SuffixTree<Vec<SocketAddr>>, Vec<SocketAddr>) {
    let mut routes: SuffixTree<Vec<SocketAddr>> = SuffixTree::new();
    let mut defaults = Vec::new();
    merge_server_list(text, &mut routes, &mut defaults);
    (routes, defaults)
}

/// Same parse as `parse_server_list`, but accumulating into caller-owned
/// structures so that multiple `;`-separated server-list files can
/// contribute to one combined route tree and default list.
pub fn merge_server_list(
    text: &str,
    routes: &mut SuffixTree<Vec<SocketAddr>>,
    defaults: &mut Vec<SocketAddr>,
) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(rest) = line.strip_prefix("server=") else {
            continue;
        };
        if let Some(rest) = rest.strip_prefix('/') {
            let mut parts = rest.splitn(2, '/');
            let (Some(domain), Some(ip)) = (parts.next(), parts.next()) else {
                continue;
            };
            if let Some(addr) = parse_nameserver(ip) {
                let mut addrs = routes.search(domain).cloned().unwrap_or_default();
                addrs.push(addr);
                routes.insert(domain, addrs);
            }
        } else if let Some(addr) = parse_nameserver(rest) {
            defaults.push(addr);
        }
    }
}

/// Parse a standard `resolv.conf`: `nameserver <ip>` lines contribute
/// default upstreams (port 53); everything else is ignored.
pub fn parse_resolv_conf(text: &str) -> Vec<SocketAddr> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("nameserver"))
        .filter_map(|rest| rest.trim().parse::<std::net::IpAddr>().ok())
        .map(|ip| SocketAddr::new(ip, 53))
        .collect()
}

fn parse_nameserver(raw: &str) -> Option<SocketAddr> {
    let (host, port) = match raw.split_once('#') {
        Some((host, port)) => (host, port.parse().ok()?),
        None => (raw, 53u16),
    };
    format!("{host}:{port}").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use hickory_proto::rr::{DNSClass, Name, RecordType};

    fn test_query(name: &str) -> Query {
        let mut query = Query::new();
        query.set_name(Name::from_str(name).unwrap());
        query.set_query_type(RecordType::A);
        query.set_query_class(DNSClass::IN);
        query
    }

    /// Binds a loopback UDP socket that answers the first query it receives
    /// with `rcode`, after `delay`, then exits.
    async fn spawn_fake_nameserver(rcode: ResponseCode, delay: Duration) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            if let Ok((n, peer)) = socket.recv_from(&mut buf).await {
                if let Ok(query_msg) = Message::from_vec(&buf[..n]) {
                    tokio::time::sleep(delay).await;
                    let mut resp = Message::new();
                    resp.set_id(query_msg.id());
                    resp.set_message_type(MessageType::Response);
                    resp.set_op_code(OpCode::Query);
                    resp.set_response_code(rcode);
                    for q in query_msg.queries() {
                        resp.add_query(q.clone());
                    }
                    if let Ok(wire) = resp.to_vec() {
                        let _ = socket.send_to(&wire, peer).await;
                    }
                }
            }
        });
        addr
    }

    /// A loopback nameserver that receives a query and never replies, so the
    /// caller always times out against it.
    async fn spawn_silent_nameserver() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let _ = socket.recv_from(&mut buf).await;
        });
        addr
    }

    #[tokio::test]
    async fn race_returns_the_first_valid_answer() {
        let fast = spawn_fake_nameserver(ResponseCode::NoError, Duration::from_millis(5)).await;
        let slow = spawn_fake_nameserver(ResponseCode::NoError, Duration::from_millis(300)).await;
        let resolver = Resolver::new(
            ResolverSettings {
                timeout: Duration::from_millis(500),
                interval: Duration::from_millis(50),
                set_edns0: false,
                default_nameservers: vec![fast, slow],
            },
            SuffixTree::new(),
        );

        let query = test_query("example.com.");
        let started = Instant::now();
        let result = resolver.resolve(Transport::Udp, &query).await.unwrap();
        assert_eq!(result.response_code(), ResponseCode::NoError);
        // Won on the fast nameserver, well before the slow one would reply.
        assert!(started.elapsed() < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn servfail_is_discarded_and_the_next_nameserver_wins() {
        let servfail = spawn_fake_nameserver(ResponseCode::ServFail, Duration::from_millis(5)).await;
        let valid = spawn_fake_nameserver(ResponseCode::NoError, Duration::from_millis(5)).await;
        let resolver = Resolver::new(
            ResolverSettings {
                timeout: Duration::from_millis(500),
                interval: Duration::from_millis(20),
                set_edns0: false,
                default_nameservers: vec![servfail, valid],
            },
            SuffixTree::new(),
        );

        let query = test_query("example.com.");
        let result = resolver.resolve(Transport::Udp, &query).await.unwrap();
        assert_eq!(result.response_code(), ResponseCode::NoError);
    }

    #[tokio::test]
    async fn exhausting_every_nameserver_without_a_valid_answer_fails() {
        let a = spawn_silent_nameserver().await;
        let b = spawn_silent_nameserver().await;
        let resolver = Resolver::new(
            ResolverSettings {
                timeout: Duration::from_millis(30),
                interval: Duration::from_millis(10),
                set_edns0: false,
                default_nameservers: vec![a, b],
            },
            SuffixTree::new(),
        );

        let query = test_query("example.com.");
        let err = resolver.resolve(Transport::Udp, &query).await.unwrap_err();
        assert!(matches!(err, ResolveError::Failed(_)));
    }

    #[test]
    fn parses_domain_routed_and_default_servers() {
        let text = "server=/example.com/10.0.0.1\nserver=8.8.8.8\nserver=9.9.9.9#5353\n# comment\n\n";
        let (routes, defaults) = parse_server_list(text);
        assert_eq!(
            routes.search("sub.example.com"),
            Some(&vec!["10.0.0.1:53".parse::<SocketAddr>().unwrap()])
        );
        assert_eq!(
            defaults,
            vec![
                "8.8.8.8:53".parse::<SocketAddr>().unwrap(),
                "9.9.9.9:5353".parse::<SocketAddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let (routes, defaults) = parse_server_list("not a server line\nserver=\nserver=/onlydomain\n");
        assert!(defaults.is_empty());
        assert!(routes.search("onlydomain").is_none());
    }

    #[test]
    fn parses_resolv_conf_nameservers() {
        let servers = parse_resolv_conf("nameserver 1.1.1.1\nsearch example.com\nnameserver 8.8.8.8\n");
        assert_eq!(
            servers,
            vec![
                "1.1.1.1:53".parse::<SocketAddr>().unwrap(),
                "8.8.8.8:53".parse::<SocketAddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn empty_default_list_fails_to_resolve_nameservers() {
        let resolver = Resolver::new(
            ResolverSettings {
                timeout: Duration::from_millis(50),
                interval: Duration::from_millis(10),
                set_edns0: false,
                default_nameservers: vec![],
            },
            SuffixTree::new(),
        );
        assert!(resolver.nameservers_for("example.com").is_empty());
    }
}
