//! Cognito user pool client over the JSON 1.1 protocol.
//!
//! Every operation is a `POST` to the pool endpoint with an
//! `X-Amz-Target` header naming the action. Errors come back as a
//! non-success status with a `__type` field holding the exception name.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};
use url::Url;

use larkspur_core::{Email, Password, UserId, VerificationCode};

use super::{
    AuthTokens, CodeDelivery, ErrorName, IdentityError, IdentityProvider, ResetNextStep,
    SignUpNextStep, UserProfile,
};
use crate::config::IdentityConfig;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE_JSON_1_1: &str = "application/x-amz-json-1.1";

/// Client for a Cognito user pool app client.
#[derive(Clone)]
pub struct CognitoClient {
    inner: Arc<CognitoClientInner>,
}

struct CognitoClientInner {
    client: reqwest::Client,
    endpoint: Url,
    client_id: String,
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: String,
    #[serde(default, alias = "Message")]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: u64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct CodeDeliveryDetails {
    destination: Option<String>,
    delivery_medium: Option<String>,
}

impl From<CodeDeliveryDetails> for CodeDelivery {
    fn from(details: CodeDeliveryDetails) -> Self {
        Self {
            destination: details.destination,
            medium: details.delivery_medium,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CodeDeliveryResponse {
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    user_confirmed: bool,
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    username: String,
    #[serde(default)]
    user_attributes: Vec<Attribute>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Attribute {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct Empty {}

impl GetUserResponse {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.user_attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    fn into_profile(self) -> Result<UserProfile, IdentityError> {
        let email = self
            .attribute("email")
            .ok_or_else(|| IdentityError::Parse("user has no email attribute".to_string()))
            .and_then(|raw| Email::parse(raw).map_err(|e| IdentityError::Parse(e.to_string())))?;
        let id = UserId::new(self.attribute("sub").unwrap_or(&self.username));

        Ok(UserProfile {
            id,
            email,
            email_verified: self.attribute("email_verified") == Some("true"),
            given_name: self.attribute("given_name").map(str::to_string),
            family_name: self.attribute("family_name").map(str::to_string),
            phone_number: self.attribute("phone_number").map(str::to_string),
        })
    }
}

impl From<AuthenticationResult> for AuthTokens {
    fn from(result: AuthenticationResult) -> Self {
        Self {
            access_token: SecretString::from(result.access_token),
            id_token: result.id_token.map(SecretString::from),
            refresh_token: result.refresh_token.map(SecretString::from),
            expires_in: result.expires_in,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

impl CognitoClient {
    /// Create a client for the configured user pool app client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("larkspur-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(CognitoClientInner {
                client,
                endpoint: config.endpoint.clone(),
                client_id: config.client_id.clone(),
            }),
        })
    }

    /// Invoke a user pool action and decode the response.
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        body: serde_json::Value,
    ) -> Result<T, IdentityError> {
        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .header(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON_1_1))
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                action,
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse identity provider response"
            );
            IdentityError::Parse(e.to_string())
        })
    }

    async fn initiate_auth(
        &self,
        flow: &str,
        parameters: serde_json::Value,
    ) -> Result<AuthTokens, IdentityError> {
        let response: InitiateAuthResponse = self
            .call(
                "InitiateAuth",
                json!({
                    "AuthFlow": flow,
                    "ClientId": self.inner.client_id,
                    "AuthParameters": parameters,
                }),
            )
            .await?;

        if let Some(challenge) = response.challenge_name {
            warn!(challenge = %challenge, "Unsupported auth challenge");
            return Err(IdentityError::Unexpected(format!(
                "unsupported challenge {challenge}"
            )));
        }

        response
            .authentication_result
            .map(AuthTokens::from)
            .ok_or_else(|| IdentityError::Unexpected("missing authentication result".to_string()))
    }
}

/// Turn an error body into an [`IdentityError`].
fn parse_error(status: u16, body: &str) -> IdentityError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => IdentityError::named(ErrorName::parse(&err.kind), err.message),
        Err(_) => {
            tracing::error!(
                status,
                body = %body.chars().take(500).collect::<String>(),
                "Identity provider returned an unrecognized error"
            );
            IdentityError::Unexpected(format!("status {status}"))
        }
    }
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    #[instrument(skip(self, password), fields(email = %username.obfuscated()))]
    async fn sign_in(&self, username: &Email, password: &str) -> Result<AuthTokens, IdentityError> {
        self.initiate_auth(
            "USER_PASSWORD_AUTH",
            json!({ "USERNAME": username.as_str(), "PASSWORD": password }),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &SecretString) -> Result<AuthTokens, IdentityError> {
        self.initiate_auth(
            "REFRESH_TOKEN_AUTH",
            json!({ "REFRESH_TOKEN": refresh_token.expose_secret() }),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn user_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<UserProfile, IdentityError> {
        let response: GetUserResponse = self
            .call(
                "GetUser",
                json!({ "AccessToken": access_token.expose_secret() }),
            )
            .await?;
        response.into_profile()
    }

    #[instrument(skip(self, access_token, attributes), fields(count = attributes.len()))]
    async fn update_attributes(
        &self,
        access_token: &SecretString,
        attributes: &[(String, String)],
    ) -> Result<(), IdentityError> {
        let attributes: Vec<Attribute> = attributes
            .iter()
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();

        let _: serde_json::Value = self
            .call(
                "UpdateUserAttributes",
                json!({
                    "AccessToken": access_token.expose_secret(),
                    "UserAttributes": attributes,
                }),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), IdentityError> {
        let _: Empty = self
            .call(
                "GlobalSignOut",
                json!({ "AccessToken": access_token.expose_secret() }),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(email = %username.obfuscated()))]
    async fn reset_password(&self, username: &Email) -> Result<ResetNextStep, IdentityError> {
        let response: CodeDeliveryResponse = self
            .call(
                "ForgotPassword",
                json!({ "ClientId": self.inner.client_id, "Username": username.as_str() }),
            )
            .await?;

        Ok(response
            .code_delivery_details
            .map_or(ResetNextStep::Done, |details| {
                ResetNextStep::ConfirmWithCode(details.into())
            }))
    }

    #[instrument(skip(self, code, new_password), fields(email = %username.obfuscated()))]
    async fn confirm_reset_password(
        &self,
        username: &Email,
        code: &VerificationCode,
        new_password: &Password,
    ) -> Result<(), IdentityError> {
        let _: Empty = self
            .call(
                "ConfirmForgotPassword",
                json!({
                    "ClientId": self.inner.client_id,
                    "Username": username.as_str(),
                    "ConfirmationCode": code.as_str(),
                    "Password": new_password.expose(),
                }),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, password), fields(email = %username.obfuscated()))]
    async fn sign_up(
        &self,
        username: &Email,
        password: &Password,
    ) -> Result<SignUpNextStep, IdentityError> {
        let response: SignUpResponse = self
            .call(
                "SignUp",
                json!({
                    "ClientId": self.inner.client_id,
                    "Username": username.as_str(),
                    "Password": password.expose(),
                    "UserAttributes": [{ "Name": "email", "Value": username.as_str() }],
                }),
            )
            .await?;

        if response.user_confirmed {
            return Ok(SignUpNextStep::Done);
        }
        Ok(SignUpNextStep::ConfirmWithCode(
            response.code_delivery_details.unwrap_or_default().into(),
        ))
    }

    #[instrument(skip(self, code), fields(email = %username.obfuscated()))]
    async fn confirm_sign_up(
        &self,
        username: &Email,
        code: &VerificationCode,
    ) -> Result<(), IdentityError> {
        let _: Empty = self
            .call(
                "ConfirmSignUp",
                json!({
                    "ClientId": self.inner.client_id,
                    "Username": username.as_str(),
                    "ConfirmationCode": code.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(email = %username.obfuscated()))]
    async fn resend_sign_up_code(&self, username: &Email) -> Result<CodeDelivery, IdentityError> {
        let response: CodeDeliveryResponse = self
            .call(
                "ResendConfirmationCode",
                json!({ "ClientId": self.inner.client_id, "Username": username.as_str() }),
            )
            .await?;
        Ok(response.code_delivery_details.unwrap_or_default().into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_reads_type_and_message() {
        let err = parse_error(
            400,
            r#"{"__type":"CodeMismatchException","message":"Invalid verification code provided"}"#,
        );
        assert_eq!(err.name(), Some(&ErrorName::CodeMismatch));
        assert_eq!(
            err.to_string(),
            "CodeMismatchException: Invalid verification code provided"
        );
    }

    #[test]
    fn test_parse_error_accepts_capitalized_message() {
        let err = parse_error(
            400,
            r#"{"__type":"UserNotFoundException","Message":"Username/client id combination not found."}"#,
        );
        assert_eq!(err.name(), Some(&ErrorName::UserNotFound));
    }

    #[test]
    fn test_parse_error_unrecognized_body() {
        let err = parse_error(502, "<html>Bad Gateway</html>");
        assert!(matches!(err, IdentityError::Unexpected(_)));
    }

    #[test]
    fn test_profile_from_attributes() {
        let response: GetUserResponse = serde_json::from_str(
            r#"{
                "Username": "3f2a",
                "UserAttributes": [
                    {"Name": "sub", "Value": "3f2a-sub"},
                    {"Name": "email", "Value": "Ada@Example.com"},
                    {"Name": "email_verified", "Value": "true"},
                    {"Name": "given_name", "Value": "Ada"}
                ]
            }"#,
        )
        .unwrap();

        let profile = response.into_profile().unwrap();
        assert_eq!(profile.id.as_str(), "3f2a-sub");
        assert_eq!(profile.email.as_str(), "ada@example.com");
        assert!(profile.email_verified);
        assert_eq!(profile.given_name.as_deref(), Some("Ada"));
        assert_eq!(profile.family_name, None);
    }

    #[test]
    fn test_profile_without_email_is_rejected() {
        let response: GetUserResponse =
            serde_json::from_str(r#"{"Username": "u", "UserAttributes": []}"#).unwrap();
        assert!(matches!(
            response.into_profile(),
            Err(IdentityError::Parse(_))
        ));
    }

    #[test]
    fn test_sign_up_response_decodes() {
        let response: SignUpResponse = serde_json::from_str(
            r#"{
                "UserConfirmed": false,
                "UserSub": "abc",
                "CodeDeliveryDetails": {
                    "AttributeName": "email",
                    "DeliveryMedium": "EMAIL",
                    "Destination": "a***@e***"
                }
            }"#,
        )
        .unwrap();
        assert!(!response.user_confirmed);
        let delivery: CodeDelivery = response.code_delivery_details.unwrap().into();
        assert_eq!(delivery.medium.as_deref(), Some("EMAIL"));
        assert_eq!(delivery.destination.as_deref(), Some("a***@e***"));
    }
}
