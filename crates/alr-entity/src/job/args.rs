//! Queue payload for a slice of an ALR export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::JobId;

/// Arguments the dispatcher enqueues for one ALR work unit.
///
/// Field names follow the dispatcher's JSON encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobAlrEnqueueArgs {
    /// Parent job.
    #[serde(rename = "ID")]
    pub id: u64,
    /// Owning account identifier.
    #[serde(rename = "CMSID")]
    pub cms_id: String,
    /// Beneficiaries covered by this slice.
    #[serde(rename = "MBIs", default)]
    pub mbis: Vec<String>,
    /// Base path of the claims API the slice reads from.
    #[serde(rename = "BBBasePath", default)]
    pub bb_base_path: String,
    /// Start of the attribution window.
    #[serde(rename = "LowerBound", default)]
    pub lower_bound: Option<DateTime<Utc>>,
    /// End of the attribution window.
    #[serde(rename = "UpperBound", default)]
    pub upper_bound: Option<DateTime<Utc>>,
}

impl JobAlrEnqueueArgs {
    /// Parent job identifier.
    pub fn job_id(&self) -> JobId {
        JobId(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_minimal_payload() {
        let args: JobAlrEnqueueArgs =
            serde_json::from_str(r#"{"ID": 7, "CMSID": "A0001"}"#).unwrap();
        assert_eq!(args.job_id(), JobId(7));
        assert_eq!(args.cms_id, "A0001");
        assert!(args.mbis.is_empty());
        assert!(args.lower_bound.is_none());
    }

    #[test]
    fn test_decode_rejects_negative_id() {
        let result = serde_json::from_str::<JobAlrEnqueueArgs>(r#"{"ID": -1, "CMSID": "A0001"}"#);
        assert!(result.is_err());
    }
}
