//! Config flow and options flow.
//!
//! Both flows are step machines that return a [`FlowResult`] per step: a form
//! to show, an entry to create, or an abort. Rendering the forms and storing
//! the created records is up to the caller.

use crate::host::HostResolver;
use crate::types::{Capability, EntryData, EntryOptions};
use std::collections::{BTreeMap, VecDeque};

pub const ENTRY_TITLE: &str = "CompreFace";
pub const USER_STEP: &str = "user";
pub const ERROR_BASE: &str = "base";
pub const ERROR_VALUE: &str = "value_error";
pub const ABORT_SINGLE_INSTANCE: &str = "single_instance_allowed";
pub const ABORT_UNKNOWN_STEP: &str = "unknown_step";

/// Outcome of one flow step.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowResult<T> {
    Form {
        step_id: String,
        /// Field names the form asks for.
        fields: Vec<String>,
        errors: BTreeMap<String, String>,
    },
    CreateEntry {
        title: String,
        data: T,
    },
    Abort {
        reason: String,
    },
}

impl<T> FlowResult<T> {
    fn form(step_id: &str, fields: Vec<String>) -> Self {
        FlowResult::Form {
            step_id: step_id.to_string(),
            fields,
            errors: BTreeMap::new(),
        }
    }

    fn abort(reason: &str) -> Self {
        FlowResult::Abort {
            reason: reason.to_string(),
        }
    }
}

/// Fields of the user step, in display order.
pub fn user_fields() -> Vec<String> {
    let mut fields = vec!["host".to_string(), "port".to_string()];
    fields.extend(Capability::ALL.iter().map(|c| c.api_key_field().to_string()));
    fields
}

/// Single-step flow creating the configuration entry.
pub struct ConfigFlow<'a> {
    resolver: &'a dyn HostResolver,
}

impl<'a> ConfigFlow<'a> {
    pub fn new(resolver: &'a dyn HostResolver) -> Self {
        Self { resolver }
    }

    /// Handle the user step.
    ///
    /// Only one entry may exist; with `entry_exists` set the flow aborts
    /// before looking at the input.
    pub async fn step_user(
        &self,
        user_input: Option<EntryData>,
        entry_exists: bool,
    ) -> FlowResult<EntryData> {
        if entry_exists {
            return FlowResult::abort(ABORT_SINGLE_INSTANCE);
        }

        let Some(input) = user_input else {
            return FlowResult::form(USER_STEP, user_fields());
        };

        let host_ok = match self.resolver.resolve(&input.host).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(host = %input.host, error = %e, "config flow: host rejected");
                false
            }
        };

        if host_ok && input.has_any_api_key() {
            tracing::info!(host = %input.host, port = input.port, "config flow: entry created");
            return FlowResult::CreateEntry {
                title: ENTRY_TITLE.to_string(),
                data: input,
            };
        }

        if !input.has_any_api_key() {
            tracing::warn!("config flow: no API key provided");
        }

        let mut errors = BTreeMap::new();
        errors.insert(ERROR_BASE.to_string(), ERROR_VALUE.to_string());
        FlowResult::Form {
            step_id: USER_STEP.to_string(),
            fields: user_fields(),
            errors,
        }
    }
}

/// Walks the enabled capabilities, one camera-selection form each.
///
/// Capabilities are visited in the fixed order recognition, verification,
/// detection; those without an API key are skipped.
pub struct OptionsFlow {
    options: EntryOptions,
    pending: VecDeque<Capability>,
    current: Option<Capability>,
}

impl OptionsFlow {
    pub fn new(data: &EntryData, options: &EntryOptions) -> Self {
        Self {
            options: options.clone(),
            pending: data.enabled_capabilities().into(),
            current: None,
        }
    }

    /// The capability whose form is currently shown.
    pub fn current(&self) -> Option<Capability> {
        self.current
    }

    pub fn step_init(&mut self) -> FlowResult<EntryOptions> {
        self.next_step()
    }

    /// Handle the form for `capability`; `None` (re)shows it.
    pub fn step(
        &mut self,
        capability: Capability,
        devices: Option<Vec<String>>,
    ) -> FlowResult<EntryOptions> {
        if self.current != Some(capability) {
            tracing::warn!(step = %capability, "options flow: step is not active");
            return FlowResult::abort(ABORT_UNKNOWN_STEP);
        }

        match devices {
            Some(devices) => {
                tracing::debug!(step = %capability, count = devices.len(), "options flow: devices selected");
                self.options.set_devices(capability, devices);
                self.next_step()
            }
            None => Self::capability_form(capability),
        }
    }

    fn next_step(&mut self) -> FlowResult<EntryOptions> {
        match self.pending.pop_front() {
            Some(capability) => {
                self.current = Some(capability);
                Self::capability_form(capability)
            }
            None => {
                self.current = None;
                FlowResult::CreateEntry {
                    title: String::new(),
                    data: self.options.clone(),
                }
            }
        }
    }

    fn capability_form(capability: Capability) -> FlowResult<EntryOptions> {
        FlowResult::form(
            capability.step_id(),
            vec![capability.devices_field().to_string()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostError;
    use async_trait::async_trait;

    /// Resolves only the names it was given.
    struct FakeResolver(Vec<&'static str>);

    #[async_trait]
    impl HostResolver for FakeResolver {
        async fn resolve(&self, host: &str) -> Result<(), HostError> {
            let name = crate::host::hostname(host)?;
            if self.0.iter().any(|known| *known == name) {
                Ok(())
            } else {
                Err(HostError::NoAddresses(host.to_string()))
            }
        }
    }

    fn input(host: &str, recognize: &str, verify: &str, detect: &str) -> EntryData {
        EntryData {
            host: host.into(),
            port: 8000,
            recognize_api_key: recognize.into(),
            verify_api_key: verify.into(),
            detect_api_key: detect.into(),
        }
    }

    fn assert_value_error(result: &FlowResult<EntryData>) {
        match result {
            FlowResult::Form { step_id, errors, .. } => {
                assert_eq!(step_id, USER_STEP);
                assert_eq!(errors.get(ERROR_BASE).map(String::as_str), Some(ERROR_VALUE));
            }
            other => panic!("expected form with error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_input_shows_empty_form() {
        let resolver = FakeResolver(vec![]);
        let result = ConfigFlow::new(&resolver).step_user(None, false).await;
        match result {
            FlowResult::Form { step_id, fields, errors } => {
                assert_eq!(step_id, USER_STEP);
                assert_eq!(fields.len(), 5);
                assert!(errors.is_empty());
            }
            other => panic!("expected form, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_valid_input_creates_entry() {
        let resolver = FakeResolver(vec!["api.example.com"]);
        let data: EntryData = serde_json::from_value(serde_json::json!({
            "host": "api.example.com",
            "port": 8000,
            "recognize_api_key": "abc",
        }))
        .unwrap();

        let result = ConfigFlow::new(&resolver).step_user(Some(data), false).await;
        assert_eq!(
            result,
            FlowResult::CreateEntry {
                title: ENTRY_TITLE.to_string(),
                data: input("api.example.com", "abc", "", ""),
            }
        );
    }

    #[tokio::test]
    async fn test_unresolvable_host_rejected() {
        let resolver = FakeResolver(vec!["api.example.com"]);
        let result = ConfigFlow::new(&resolver)
            .step_user(Some(input("nowhere.invalid", "abc", "def", "ghi")), false)
            .await;
        assert_value_error(&result);
    }

    #[tokio::test]
    async fn test_host_with_path_or_whitespace_rejected() {
        let resolver = FakeResolver(vec!["api.example.com"]);
        let flow = ConfigFlow::new(&resolver);
        for host in ["api.example.com/compreface", " api.example.com "] {
            let result = flow.step_user(Some(input(host, "abc", "", "")), false).await;
            assert_value_error(&result);
        }
    }

    #[tokio::test]
    async fn test_all_keys_empty_rejected_even_with_valid_host() {
        let resolver = FakeResolver(vec!["api.example.com"]);
        let result = ConfigFlow::new(&resolver)
            .step_user(Some(input("api.example.com", "", "", "")), false)
            .await;
        assert_value_error(&result);
    }

    #[tokio::test]
    async fn test_single_instance() {
        let resolver = FakeResolver(vec!["api.example.com"]);
        let flow = ConfigFlow::new(&resolver);
        for user_input in [None, Some(input("api.example.com", "abc", "", ""))] {
            assert_eq!(
                flow.step_user(user_input, true).await,
                FlowResult::Abort {
                    reason: ABORT_SINGLE_INSTANCE.to_string()
                }
            );
        }
    }

    #[test]
    fn test_options_walks_enabled_capabilities_in_order() {
        let data = input("h", "r", "", "d");
        let mut flow = OptionsFlow::new(&data, &EntryOptions::default());

        let first = flow.step_init();
        assert!(matches!(&first, FlowResult::Form { step_id, .. } if step_id == "recognition"));
        assert_eq!(flow.current(), Some(Capability::Recognition));

        let second = flow.step(Capability::Recognition, Some(vec!["cam1".into(), "cam2".into()]));
        match &second {
            FlowResult::Form { step_id, fields, .. } => {
                assert_eq!(step_id, "detection");
                assert_eq!(fields, &vec!["detection_camera_devices".to_string()]);
            }
            other => panic!("expected detection form, got {other:?}"),
        }

        let done = flow.step(Capability::Detection, Some(vec!["cam3".into()]));
        match done {
            FlowResult::CreateEntry { data, .. } => {
                assert_eq!(
                    data.recognition_camera_devices,
                    Some(vec!["cam1".to_string(), "cam2".to_string()])
                );
                assert_eq!(data.verification_camera_devices, None);
                assert_eq!(data.detection_camera_devices, Some(vec!["cam3".to_string()]));
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn test_options_merges_into_existing() {
        let data = input("h", "r", "", "");
        let existing = EntryOptions {
            recognition_camera_devices: Some(vec!["old".into()]),
            verification_camera_devices: Some(vec!["kept".into()]),
            detection_camera_devices: None,
        };
        let mut flow = OptionsFlow::new(&data, &existing);
        flow.step_init();

        match flow.step(Capability::Recognition, Some(vec!["new".into()])) {
            FlowResult::CreateEntry { data, .. } => {
                assert_eq!(data.recognition_camera_devices, Some(vec!["new".to_string()]));
                assert_eq!(data.verification_camera_devices, Some(vec!["kept".to_string()]));
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn test_options_without_capabilities_completes_immediately() {
        let data = input("h", "", "", "");
        let existing = EntryOptions {
            recognition_camera_devices: Some(vec!["cam".into()]),
            ..Default::default()
        };
        let mut flow = OptionsFlow::new(&data, &existing);
        assert_eq!(
            flow.step_init(),
            FlowResult::CreateEntry {
                title: String::new(),
                data: existing,
            }
        );
    }

    #[test]
    fn test_options_reshow_and_wrong_step() {
        let data = input("h", "r", "v", "");
        let mut flow = OptionsFlow::new(&data, &EntryOptions::default());
        flow.step_init();

        let again = flow.step(Capability::Recognition, None);
        assert!(matches!(&again, FlowResult::Form { step_id, .. } if step_id == "recognition"));

        assert_eq!(
            flow.step(Capability::Verification, Some(vec![])),
            FlowResult::Abort {
                reason: ABORT_UNKNOWN_STEP.to_string()
            }
        );
    }
}
