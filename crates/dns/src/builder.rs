use crate::{
    edns::Edns,
    message::{DnsFlags, DnsMessage, DnsQuestion, DnsResponseCode},
    record::DnsRecord,
};

/// Builder for [`DnsMessage`].
#[derive(Debug, Clone)]
pub struct DnsMessageBuilder {
    id: u16,
    flags: DnsFlags,
    questions: Vec<DnsQuestion>,
    answers: Vec<DnsRecord>,
    edns: Option<Edns>,
    response_code: Option<DnsResponseCode>,
}

impl Default for DnsMessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsMessageBuilder {
    /// Create a new builder for a query with recursion desired.
    pub fn new() -> Self {
        Self {
            id: 0,
            flags: DnsFlags::query(),
            questions: Vec::new(),
            answers: Vec::new(),
            edns: None,
            response_code: None,
        }
    }

    /// Start a response to `request`, copying its id, questions and EDNS presence.
    pub fn response_to(request: &DnsMessage) -> Self {
        Self {
            id: request.id,
            flags: DnsFlags::answering(&request.flags),
            questions: request.questions().to_vec(),
            edns: request.edns().map(|_| Edns::default()),
            ..Self::new()
        }
    }

    pub fn with_id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    pub fn add_question(mut self, question: DnsQuestion) -> Self {
        self.questions.push(question);
        self
    }

    pub fn add_answer(mut self, answer: DnsRecord) -> Self {
        self.answers.push(answer);
        self
    }

    /// Mark the message as a response carrying `response_code`.
    pub fn with_response(mut self, response_code: DnsResponseCode) -> Self {
        self.response_code = Some(response_code);
        self
    }

    pub fn build(self) -> DnsMessage {
        let mut flags = self.flags;
        if self.response_code.is_some() {
            flags.response = true;
        }

        let mut message = DnsMessage::new(
            self.id,
            flags,
            self.questions,
            self.answers,
            Vec::new(),
            Vec::new(),
        );
        message.set_edns(self.edns);

        if let Some(rcode) = self.response_code {
            message.set_response_code(rcode);
        }

        message
    }
}
