// Safaricom Daraja adapter
// OAuth: GET  {base}/oauth/v1/generate?grant_type=client_credentials (HTTP Basic)
// Push:  POST {base}/mpesa/stkpush/v1/processrequest (Bearer token)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::password::{generate_password, timestamp};
use super::{mask_phone, PaymentGateway, PaymentOutcome};
use crate::config::DarajaConfig;
use crate::types::{AppError, AppResult};

const TOKEN_PATH: &str = "/oauth/v1/generate";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: u32,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode", default, deserialize_with = "string_only")]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

// The acceptance check is a string comparison, so a numeric code never counts.
fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

pub struct DarajaClient {
    client: Client,
    config: DarajaConfig,
}

impl DarajaClient {
    pub fn new(config: DarajaConfig) -> AppResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(AppError::Config("Daraja base URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Step 1: exchange the consumer key/secret for a bearer token
    pub async fn fetch_access_token(&self) -> AppResult<String> {
        let response: AccessTokenResponse = self
            .client
            .get(self.url(TOKEN_PATH))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.access_token.is_empty() {
            return Err(AppError::InvalidResponse("empty access_token".to_string()));
        }

        debug!(expires_in = ?response.expires_in, "Obtained Daraja access token");
        Ok(response.access_token)
    }

    pub fn build_stk_push(&self, phone_number: &str, timestamp: &str) -> StkPushRequest {
        StkPushRequest {
            business_short_code: self.config.short_code.clone(),
            password: generate_password(&self.config.short_code, &self.config.passkey, timestamp),
            timestamp: timestamp.to_string(),
            transaction_type: TRANSACTION_TYPE.to_string(),
            amount: self.config.amount,
            party_a: phone_number.to_string(),
            party_b: self.config.short_code.clone(),
            phone_number: phone_number.to_string(),
            callback_url: self.config.callback_url.clone(),
            account_reference: self.config.account_reference.clone(),
            transaction_desc: self.config.transaction_desc.clone(),
        }
    }

    /// Step 2: submit the push request
    pub async fn send_stk_push(&self, access_token: &str, request: &StkPushRequest) -> AppResult<StkPushResponse> {
        let response = self
            .client
            .post(self.url(STK_PUSH_PATH))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl PaymentGateway for DarajaClient {
    async fn initiate_payment_at(&self, phone_number: &str, now: DateTime<Utc>) -> AppResult<PaymentOutcome> {
        let access_token = self.fetch_access_token().await?;

        let request = self.build_stk_push(phone_number, &timestamp(now));
        let response = self.send_stk_push(&access_token, &request).await?;
        let outcome = PaymentOutcome::from_response(&response);

        if outcome.accepted {
            info!(
                phone = %mask_phone(phone_number),
                checkout_request_id = ?outcome.checkout_request_id,
                "STK push accepted"
            );
        } else {
            warn!(
                phone = %mask_phone(phone_number),
                response_code = ?outcome.response_code,
                description = ?outcome.description,
                "STK push rejected by gateway"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::Server) -> DarajaClient {
        let mut config = DarajaConfig::sandbox("key", "secret", "passkey");
        config.base_url = server.url();
        config.timeout_secs = 5;
        DarajaClient::new(config).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap()
    }

    async fn mock_token(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("GET", TOKEN_PATH)
            .match_query(Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()))
            // base64("key:secret")
            .match_header("authorization", "Basic a2V5OnNlY3JldA==")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"token-123","expires_in":"3599"}"#)
            .create_async()
            .await
    }

    #[test]
    fn test_stk_push_request_shape() {
        let client = DarajaClient::new(DarajaConfig::sandbox("key", "secret", "passkey")).unwrap();
        let request = client.build_stk_push("254712345678", "20240307090502");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "BusinessShortCode": "174379",
                "Password": "MTc0Mzc5cGFzc2tleTIwMjQwMzA3MDkwNTAy",
                "Timestamp": "20240307090502",
                "TransactionType": "CustomerPayBillOnline",
                "Amount": 1,
                "PartyA": "254712345678",
                "PartyB": "174379",
                "PhoneNumber": "254712345678",
                "CallBackURL": "https://yourdomain.com/mpesa/callback",
                "AccountReference": "InvestWise Predictor",
                "TransactionDesc": "Premium Content Payment"
            })
        );
    }

    #[test]
    fn test_empty_base_url_is_rejected() {
        let mut config = DarajaConfig::sandbox("key", "secret", "passkey");
        config.base_url = String::new();
        assert!(matches!(DarajaClient::new(config), Err(AppError::Config(_))));
    }

    #[test]
    fn test_response_code_must_be_string() {
        let response: StkPushResponse = serde_json::from_str(r#"{"ResponseCode":0}"#).unwrap();
        assert_eq!(response.response_code, None);

        let response: StkPushResponse = serde_json::from_str(r#"{"ResponseCode":"0"}"#).unwrap();
        assert_eq!(response.response_code.as_deref(), Some("0"));

        let response: StkPushResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.response_code, None);
    }

    #[tokio::test]
    async fn test_fetch_access_token() {
        let mut server = mockito::Server::new_async().await;
        let token_mock = mock_token(&mut server).await;

        let token = client_for(&server).fetch_access_token().await.unwrap();

        assert_eq!(token, "token-123");
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_access_token_rejects_empty_token() {
        let mut server = mockito::Server::new_async().await;
        let _token_mock = server
            .mock("GET", TOKEN_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":""}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_access_token().await.unwrap_err();
        assert!(matches!(err, AppError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_initiate_payment_accepted() {
        let mut server = mockito::Server::new_async().await;
        let token_mock = mock_token(&mut server).await;
        let push_mock = server
            .mock("POST", STK_PUSH_PATH)
            .match_header("authorization", "Bearer token-123")
            .match_body(Matcher::PartialJson(json!({
                "BusinessShortCode": "174379",
                "Password": "MTc0Mzc5cGFzc2tleTIwMjQwMzA3MDkwNTAy",
                "Timestamp": "20240307090502",
                "PartyA": "254712345678",
                "PhoneNumber": "254712345678"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResponseCode": "0",
                    "ResponseDescription": "Success. Request accepted for processing",
                    "CustomerMessage": "Success. Request accepted for processing"
                }"#,
            )
            .create_async()
            .await;

        let outcome = client_for(&server)
            .initiate_payment_at("254712345678", fixed_now())
            .await
            .unwrap();

        assert!(outcome.accepted);
        assert_eq!(
            outcome.checkout_request_id.as_deref(),
            Some("ws_CO_191220191020363925")
        );
        token_mock.assert_async().await;
        push_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_initiate_payment_rejected_code() {
        let mut server = mockito::Server::new_async().await;
        let _token_mock = mock_token(&mut server).await;
        let _push_mock = server
            .mock("POST", STK_PUSH_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ResponseCode":"1","ResponseDescription":"Rejected"}"#)
            .create_async()
            .await;

        let outcome = client_for(&server)
            .initiate_payment_at("254712345678", fixed_now())
            .await
            .unwrap();

        assert!(!outcome.accepted);
        assert_eq!(outcome.response_code.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_token_failure_skips_push() {
        let mut server = mockito::Server::new_async().await;
        let _token_mock = server
            .mock("GET", TOKEN_PATH)
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"errorMessage":"Invalid credentials"}"#)
            .create_async()
            .await;
        let push_mock = server
            .mock("POST", STK_PUSH_PATH)
            .expect(0)
            .create_async()
            .await;

        let err = client_for(&server)
            .initiate_payment_at("254712345678", fixed_now())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Gateway(_)));
        push_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_push_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _token_mock = mock_token(&mut server).await;
        let _push_mock = server
            .mock("POST", STK_PUSH_PATH)
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"errorCode":"400.002.02","errorMessage":"Bad Request - Invalid PhoneNumber"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .initiate_payment_at("not-a-phone", fixed_now())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        let mut config = DarajaConfig::sandbox("key", "secret", "passkey");
        // Port 9 (discard) on loopback is not expected to accept connections.
        config.base_url = "http://127.0.0.1:9".to_string();
        config.timeout_secs = 2;
        let client = DarajaClient::new(config).unwrap();

        let result = client.initiate_payment("254712345678").await;
        assert!(matches!(result, Err(AppError::Gateway(_))));
    }
}
