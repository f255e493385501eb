use fail::fail_point;

#[cfg(feature = "failpoints")]
use crate::bail;
use crate::error::DwhResult;
#[cfg(feature = "failpoints")]
use crate::error::ErrorKind;

pub const STAGING_WRITE__BEFORE_COMMIT: &str = "staging_write.before_commit";
pub const DIMENSION_MERGE__BEFORE_COMMIT: &str = "dimension_merge.before_commit";
pub const FACT_UPSERT__BEFORE_COMMIT: &str = "fact_upsert.before_commit";

/// Fails with the error kind named by the fail point parameter when `name` is configured
/// with `return(<kind>)`.
///
/// `connection` and `integrity` select the matching warehouse error kinds; anything else
/// raises `ErrorKind::FailpointTriggered`.
#[cfg_attr(not(feature = "failpoints"), allow(unused_variables))]
pub fn dwh_fail_point(name: &str) -> DwhResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("connection") => ErrorKind::DestinationConnectionFailed,
            Some("integrity") => ErrorKind::IntegrityViolation,
            _ => ErrorKind::FailpointTriggered,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
