//! Orchestrates a single query: hosts table, then positive cache, then
//! negative cache, then the upstream resolver, writing the cache on the way
//! out. This is the one place all the other components meet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::proto::op::{Header, ResponseCode};
use hickory_server::proto::rr::rdata::{A, AAAA};
use hickory_server::proto::rr::{RData, Record};
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use crate::cache::{NegativeCache, PositiveCache};
use crate::error::HandlerError;
use crate::hosts::{Family, HostsManager};
use crate::message::DnsMessage;
use crate::question::Question;
use crate::resolver::{Resolver, Transport};

pub struct Handler {
    pub hosts: Arc<HostsManager>,
    pub hosts_enabled: bool,
    pub hosts_ttl: u32,
    pub positive_cache: Arc<dyn PositiveCache>,
    pub negative_cache: Arc<dyn NegativeCache>,
    pub resolver: Arc<Resolver>,
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
}

impl Handler {
    async fn hosts_answer(&self, question: &Question) -> Option<Vec<Record>> {
        if !self.hosts_enabled || !question.is_ip_query() {
            return None;
        }
        let family = Family::from_qtype(question.qtype)?;
        let table = self.hosts.current().await;
        let addrs = table.get(&question.qname, family);
        if addrs.is_empty() {
            return None;
        }
        let name = question.to_query().ok()?.name().clone();
        let records = addrs
            .into_iter()
            .map(|addr| {
                let rdata = match addr {
                    std::net::IpAddr::V4(v4) => RData::A(A(v4)),
                    std::net::IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
                };
                Record::from_rdata(name.clone(), self.hosts_ttl, rdata)
            })
            .collect();
        Some(records)
    }

    async fn answer(
        &self,
        question: Question,
        transport: Transport,
    ) -> Result<DnsMessage, HandlerError> {
        if let Some(records) = self.hosts_answer(&question).await {
            return Ok(DnsMessage::new(question, records, ResponseCode::NoError));
        }

        let key = question.cache_key();

        if let Some(cached) = self.positive_cache.get(&key).await {
            return Ok(cached);
        }

        if self.negative_cache.exists(&key).await {
            return Ok(DnsMessage::new(question, Vec::new(), ResponseCode::ServFail));
        }

        let query = question
            .to_query()
            .map_err(|e| HandlerError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        match self.resolver.resolve(transport, &query).await {
            Ok(message) => {
                let answer = DnsMessage::from_wire_message(question.clone(), &message);
                if answer.is_cacheable_positive() {
                    if let Err(e) = self
                        .positive_cache
                        .set(key, answer.clone(), self.positive_ttl)
                        .await
                    {
                        log::warn!("failed to write positive cache entry: {}", e);
                    }
                }
                Ok(answer)
            }
            Err(err) => {
                log::warn!("resolve failed for {}: {}", question.qname, err);
                if let Err(e) = self.negative_cache.set(key, self.negative_ttl).await {
                    log::warn!("failed to write negative cache entry: {}", e);
                }
                Ok(DnsMessage::new(question, Vec::new(), ResponseCode::ServFail))
            }
        }
    }

    async fn handle<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handler: R,
    ) -> Result<ResponseInfo, HandlerError> {
        let query = request.queries().first().ok_or(HandlerError::NoQuestion)?;
        let question = Question::new(
            &query.name().to_string(),
            query.query_type(),
            query.query_class(),
        );
        let transport = match request.protocol() {
            Protocol::Tcp => Transport::Tcp,
            _ => Transport::Udp,
        };

        let answer = self.answer(question, transport).await?;

        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_response_code(answer.rcode);
        let response = builder.build(header, answer.answers.iter(), &[], &[], &[]);
        Ok(response_handler.send_response(response).await?)
    }
}

#[async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> ResponseInfo
    where
        R: ResponseHandler + Send,
    {
        match self.handle(request, response).await {
            Ok(info) => info,
            Err(err) => {
                log::error!("error handling request: {}", err);
                let mut header = Header::response_from_request(request.header());
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}
