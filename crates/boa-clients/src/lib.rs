pub mod boot_script;
pub mod configuration;
pub mod error;
pub mod http;
pub mod power;
pub mod rootfs;
pub mod s3;
pub mod state_waiter;

#[cfg(test)]
pub(crate) mod tests_support;

pub use boot_script::{BootScriptClient, BootScriptRegistrar};
pub use configuration::{ComponentDesiredConfig, ConfigLayer, ConfigurationClient, ConfigurationDriver, ConfigurationSummary};
pub use error::ClientError;
pub use http::{HttpBootScriptClient, HttpConfigurationClient, HttpHardwareStateClient, HttpPowerClient, HttpStatusClient, ServiceConfig};
pub use power::{GracefulParams, PowerClient, PowerController, PowerState, VendorResponse, VendorXnameError};
pub use rootfs::{build_kernel_cmdline, make_rootfs_provider, CpsS3Provider, RootfsProvider};
pub use s3::{ArtifactResolver, HttpObjectStoreClient, ObjectStoreClient, S3Config};
pub use state_waiter::StateWaiter;
