//! Azure Blob Storage clients built with `object_store`'s Azure builder.
//!
//! Builders start from the environment, so every credential source the
//! builder understands is available without configuration here.

use crate::client::{BlobClient, ClientFactory, ClientOptions, Credential};
use crate::error::TransportError;
use crate::store::{ContainerConnector, StoreClient};
use object_store::azure::MicrosoftAzureBuilder;
use object_store::{DynObjectStore, RetryConfig};
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// Builds Azure Blob Storage clients authenticated as the ambient identity
/// unless a credential override is set.
#[derive(Debug, Default)]
pub struct AzureClientFactory {
    credential: Option<Credential>,
}

impl AzureClientFactory {
    /// Create a factory resolving credentials from the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory that authenticates every client with `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
        }
    }
}

/// Opens containers of one storage account.
#[derive(Debug)]
struct AzureConnector {
    builder: MicrosoftAzureBuilder,
}

impl ContainerConnector for AzureConnector {
    fn connect(&self, container: &str) -> Result<Arc<DynObjectStore>, TransportError> {
        let store = self
            .builder
            .clone()
            .with_container_name(container)
            .build()?;
        Ok(Arc::new(store))
    }
}

fn authenticate(builder: MicrosoftAzureBuilder, credential: Credential) -> MicrosoftAzureBuilder {
    match credential {
        Credential::AccessKey(key) => builder.with_access_key(key),
        Credential::SasToken(pairs) => builder.with_sas_authorization(pairs),
        Credential::ClientSecret {
            client_id,
            client_secret,
            tenant_id,
        } => builder.with_client_secret_authorization(client_id, client_secret, tenant_id),
        Credential::BearerToken(token) => builder.with_bearer_token_authorization(token),
        Credential::AzureCli => builder.with_use_azure_cli(true),
        Credential::Anonymous => builder.with_skip_signature(true),
        Credential::Ambient => builder,
    }
}

impl ClientFactory for AzureClientFactory {
    fn resolve_credential(&self) -> Result<Credential, TransportError> {
        Ok(self.credential.clone().unwrap_or_default())
    }

    fn build_client(
        &self,
        account: &str,
        account_url: &Url,
        credential: Credential,
        options: &ClientOptions,
    ) -> Result<Arc<dyn BlobClient>, TransportError> {
        let retry = RetryConfig {
            max_retries: options.max_retries,
            retry_timeout: options.retry_timeout,
            ..Default::default()
        };
        let mut builder = authenticate(MicrosoftAzureBuilder::from_env(), credential)
            .with_account(account)
            .with_retry(retry);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        if options.allow_http {
            builder = builder.with_allow_http(true);
        }
        trace!("Building client for {} ({})", account, account_url);

        // Surface configuration errors now rather than on the first request.
        builder.clone().with_container_name("$root").build()?;

        Ok(Arc::new(StoreClient::new(AzureConnector { builder }, options)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_client_with_access_key() {
        let factory = AzureClientFactory::new();
        let url = Url::parse("https://acct.blob.core.windows.net").unwrap();
        // Account keys are base64.
        let credential = Credential::AccessKey("c2VjcmV0LWtleQ==".to_string());
        let client = factory.build_client("acct", &url, credential, &ClientOptions::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_builds_anonymous_client() {
        let factory = AzureClientFactory::new();
        let url = Url::parse("https://openaipublic.blob.core.windows.net").unwrap();
        let client = factory.build_client(
            "openaipublic",
            &url,
            Credential::Anonymous,
            &ClientOptions::default(),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_builds_client_for_custom_endpoint() {
        let factory = AzureClientFactory::new();
        let url = Url::parse("https://devstoreaccount1.blob.core.windows.net").unwrap();
        let options = ClientOptions {
            endpoint: Some("http://127.0.0.1:10000/devstoreaccount1".to_string()),
            allow_http: true,
            ..Default::default()
        };
        let client =
            factory.build_client("devstoreaccount1", &url, Credential::Anonymous, &options);
        assert!(client.is_ok());
    }

    #[test]
    fn test_resolves_override_or_ambient() {
        assert_eq!(
            AzureClientFactory::new().resolve_credential().unwrap(),
            Credential::Ambient
        );
        let factory = AzureClientFactory::with_credential(Credential::Anonymous);
        assert_eq!(factory.resolve_credential().unwrap(), Credential::Anonymous);
    }
}
