//! The cached representation of a DNS answer.
//!
//! A `DnsMessage` deliberately does not carry a transaction identifier: every
//! response sent to a client is built via `hickory_server`'s
//! `Header::response_from_request`, which copies the requester's own id, so
//! there is no identifier on the cached value to race over or rewrite.

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::Record;

use crate::question::Question;

#[derive(Debug, Clone)]
pub struct DnsMessage {
    pub question: Question,
    pub answers: Vec<Record>,
    pub rcode: ResponseCode,
}

impl DnsMessage {
    pub fn new(question: Question, answers: Vec<Record>, rcode: ResponseCode) -> Self {
        DnsMessage {
            question,
            answers,
            rcode,
        }
    }

    pub fn is_cacheable_positive(&self) -> bool {
        !self.answers.is_empty()
    }

    /// Build a standalone `hickory_proto` message carrying this answer, with a
    /// random transaction id. Used only when a `DnsMessage` must leave the
    /// process (upstream query replay for tests, or serialization into a
    /// remote cache backend) and therefore needs a real wire id.
    pub fn to_wire_message(&self, query: &Query) -> Message {
        let mut message = Message::new();
        message.set_message_type(MessageType::Response);
        message.set_op_code(OpCode::Query);
        message.set_response_code(self.rcode);
        message.add_query(query.clone());
        for record in &self.answers {
            message.add_answer(record.clone());
        }
        message
    }

    pub fn from_wire_message(question: Question, message: &Message) -> Self {
        DnsMessage {
            question,
            answers: message.answers().to_vec(),
            rcode: message.response_code(),
        }
    }
}
