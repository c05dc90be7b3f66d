//! Conversions API payload types.
//!
//! Strongly-typed payload with explicit optional fields; each field is
//! populated only when its source value normalizes successfully. All PII
//! fields are SHA-256 hashed before they enter the payload.

use crate::models::LeadRecord;
use crate::normalize;
use chrono::Utc;
use serde::Serialize;

/// Hashed/raw user-data bag. Hashed match keys are arrays of hex digests
/// as required by the API; technical fields travel raw.
#[derive(Debug, Default, Clone, Serialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<Vec<String>>,
    #[serde(rename = "fn", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ln: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub st: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zp: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbc: Option<String>,
}

impl UserData {
    /// Builds the user-data bag from a lead snapshot.
    ///
    /// The external id is the effective identity, hashed like every other
    /// match key (it may be a phone number or email after fallback).
    pub fn from_lead(record: &LeadRecord, effective_id: &str) -> Self {
        let mut user_data = UserData::default();

        if let Some(email) = normalize::normalize_email(record.email.as_deref()) {
            user_data.em = Some(vec![normalize::sha256_hex(&email)]);
        }
        if let Some(phone) =
            normalize::normalize_phone(record.phone.as_deref(), record.country.as_deref())
        {
            user_data.ph = Some(vec![normalize::sha256_hex(&phone)]);
        }

        user_data.external_id = Some(vec![normalize::sha256_hex(effective_id)]);

        user_data.client_ip_address = record.client_ip.clone();
        user_data.client_user_agent = record.user_agent.clone();

        // Browser cookie: pass through, or synthesize from the bare client
        // id using the lead's creation time.
        if let Some(fbp) = record.fbp.clone() {
            user_data.fbp = Some(fbp);
        } else if let Some(client_id) = record.client_id.as_deref() {
            let ts = normalize::to_unix_seconds(record.created_at.as_deref());
            user_data.fbp = Some(format!("fb.1.{}.{}", ts, client_id));
        }

        // Click cookie: pass through, or synthesize from the click id
        // parameter using the current time.
        if let Some(fbc) = record.fbc.clone() {
            user_data.fbc = Some(fbc);
        } else if let Some(fbclid) = record.fbclid.as_deref() {
            user_data.fbc = Some(format!("fb.1.{}.{}", Utc::now().timestamp(), fbclid));
        }

        let (first, last) = normalize::extract_names(record.full_name.as_deref());
        if let Some(first) = first {
            user_data.first_name = Some(vec![normalize::sha256_hex(&first.to_lowercase())]);
        }
        if let Some(last) = last {
            user_data.ln = Some(vec![normalize::sha256_hex(&last.to_lowercase())]);
        }

        if let Some(city) = normalize::normalize_location(record.city.as_deref()) {
            // Upstream stores one combined city/state value; the same hash
            // feeds both fields.
            let hashed = normalize::sha256_hex(&city);
            user_data.ct = Some(vec![hashed.clone()]);
            user_data.st = Some(vec![hashed]);
        }
        if let Some(zip) = normalize::normalize_location(record.postal_code.as_deref()) {
            user_data.zp = Some(vec![normalize::sha256_hex(&zip)]);
        }
        if let Some(country) = normalize::normalize_country(record.country.as_deref()) {
            user_data.country = Some(vec![normalize::sha256_hex(&country)]);
        }

        user_data
    }
}

/// Custom attributes attached to the conversion event.
#[derive(Debug, Clone, Serialize)]
pub struct CustomData {
    pub value: f64,
    pub currency: String,
    pub content_type: String,
    pub customer_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_ltv: Option<i64>,
}

impl CustomData {
    pub fn from_lead(record: &LeadRecord, value: f64, currency: &str) -> Self {
        let returning = record
            .is_customer
            .as_ref()
            .map(|flag| flag.is_returning())
            .unwrap_or(false);

        Self {
            value,
            currency: currency.to_string(),
            content_type: "lead".to_string(),
            customer_type: if returning { "returning" } else { "new" }.to_string(),
            content_name: record.service.clone(),
            content_category: record.source.clone(),
            campaign_name: record.campaign_name.clone(),
            // A zero score carries no LTV signal; leave the field out
            predicted_ltv: record.score.filter(|s| *s != 0),
        }
    }
}

/// One conversion event.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionEvent {
    pub event_name: String,
    pub event_time: i64,
    pub event_id: String,
    pub action_source: String,
    pub user_data: UserData,
    pub custom_data: CustomData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_source_url: Option<String>,
}

/// Request body for the `/{pixel_id}/events` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub data: Vec<ConversionEvent>,
    pub access_token: String,
}
