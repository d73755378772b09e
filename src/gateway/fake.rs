//! In-memory [`GatewayApi`] used by unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{GatewayApi, GatewayError, Property, ReportEntry};
use crate::session::Token;

#[derive(Default)]
pub(crate) struct FakeGateway {
    pub token: Mutex<Option<String>>,
    pub properties: Mutex<Vec<Property>>,
    pub report: Mutex<Vec<ReportEntry>>,
    pub fail_properties: Mutex<bool>,
    pub fail_report: Mutex<bool>,
    pub fail_mutations: Mutex<bool>,
    pub report_calls: AtomicUsize,
    pub property_calls: AtomicUsize,
    pub ingested: Mutex<Vec<(String, f64)>>,
    pub registered_users: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn with_token(token: &str) -> Self {
        let fake = Self::default();
        *fake.token.lock().unwrap() = Some(token.to_string());
        fake
    }

    pub fn set_properties(&self, properties: Vec<Property>) {
        *self.properties.lock().unwrap() = properties;
    }

    pub fn set_report(&self, report: Vec<ReportEntry>) {
        *self.report.lock().unwrap() = report;
    }

    pub fn fail_properties(&self, fail: bool) {
        *self.fail_properties.lock().unwrap() = fail;
    }

    pub fn fail_report(&self, fail: bool) {
        *self.fail_report.lock().unwrap() = fail;
    }

    pub fn fail_mutations(&self, fail: bool) {
        *self.fail_mutations.lock().unwrap() = fail;
    }

    pub fn report_calls(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }

    pub fn property_calls(&self) -> usize {
        self.property_calls.load(Ordering::SeqCst)
    }

    fn mutation_result(&self) -> Result<(), GatewayError> {
        if *self.fail_mutations.lock().unwrap() {
            Err(GatewayError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GatewayApi for FakeGateway {
    async fn login(&self, _email: &str, password: &str) -> Result<Token, GatewayError> {
        match self.token.lock().unwrap().clone() {
            Some(token) if password != "wrong" => Ok(Token::new(token)),
            _ => Err(GatewayError::Unauthorized),
        }
    }

    async fn register(
        &self,
        _full_name: &str,
        email: &str,
        _password: &str,
    ) -> Result<(), GatewayError> {
        self.mutation_result()?;
        self.registered_users.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn properties(&self, _token: &Token) -> Result<Vec<Property>, GatewayError> {
        self.property_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_properties.lock().unwrap() {
            return Err(GatewayError::Unavailable);
        }
        Ok(self.properties.lock().unwrap().clone())
    }

    async fn register_property(&self, _token: &Token, address: &str) -> Result<(), GatewayError> {
        self.mutation_result()?;
        let mut properties = self.properties.lock().unwrap();
        let id = format!("P{}", properties.len() + 1);
        properties.push(Property::new(id, address));
        Ok(())
    }

    async fn report(
        &self,
        _token: &Token,
        _property_id: &str,
    ) -> Result<Vec<ReportEntry>, GatewayError> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_report.lock().unwrap() {
            return Err(GatewayError::Timeout);
        }
        Ok(self.report.lock().unwrap().clone())
    }

    async fn ingest(
        &self,
        _token: &Token,
        property_id: &str,
        kwh_used: f64,
    ) -> Result<(), GatewayError> {
        self.mutation_result()?;
        self.ingested
            .lock()
            .unwrap()
            .push((property_id.to_string(), kwh_used));
        Ok(())
    }
}
