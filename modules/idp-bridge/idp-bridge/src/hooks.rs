//! Extension hook protocol.
//!
//! Two decision points can be overridden by the extension script service.
//! Whether each one is active is resolved once, when the bridge is built. A
//! disabled hook never builds its context, and a failing hook (an error, a
//! panic, or a handled translation with no usable principal) is reported as
//! [`HookOutcome::Failed`] so the caller runs its default logic.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use idp_bridge_sdk::{
    ExtensionScriptService, HookError, PrincipalRecord, ReleaseAttributesContext,
    TranslateAttributesContext,
};

use crate::config::HooksConfig;

/// Overridable decision points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    Translation,
    AttributeRelease,
}

impl HookPoint {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HookPoint::Translation => "translate_attributes",
            HookPoint::AttributeRelease => "release_attributes",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of consulting a hook
#[derive(Debug)]
pub enum HookOutcome<T> {
    /// The hook point is not active; nothing was invoked.
    Disabled,
    /// The script ran and asked for the default logic.
    Declined,
    /// The script handled the decision point.
    Handled(T),
    /// The script failed; the default logic should run.
    Failed(HookError),
}

impl<T> HookOutcome<T> {
    /// Whether the default logic has to run.
    #[must_use]
    pub fn needs_default(&self) -> bool {
        !matches!(self, HookOutcome::Handled(_))
    }
}

/// The two hook points, resolved against configuration and the script service.
pub struct ExtensionHooks {
    service: Option<Arc<dyn ExtensionScriptService>>,
    translation: bool,
    attribute_release: bool,
}

impl fmt::Debug for ExtensionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionHooks")
            .field("service", &self.service.is_some())
            .field("translation", &self.translation)
            .field("attribute_release", &self.attribute_release)
            .finish()
    }
}

impl ExtensionHooks {
    /// Resolve both hook points. A point is active only when configuration
    /// selects it and the script service reports itself enabled.
    #[must_use]
    pub fn resolve(config: HooksConfig, service: Option<Arc<dyn ExtensionScriptService>>) -> Self {
        let service_enabled = service.as_ref().is_some_and(|s| s.is_enabled());
        let hooks = Self {
            translation: config.translation && service_enabled,
            attribute_release: config.attribute_release && service_enabled,
            service,
        };
        tracing::info!(
            translation = hooks.translation,
            attribute_release = hooks.attribute_release,
            "Extension hooks resolved"
        );
        hooks
    }

    /// No active hook points.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            service: None,
            translation: false,
            attribute_release: false,
        }
    }

    #[must_use]
    pub fn is_enabled(&self, point: HookPoint) -> bool {
        match point {
            HookPoint::Translation => self.translation,
            HookPoint::AttributeRelease => self.attribute_release,
        }
    }

    fn active_service(&self, point: HookPoint) -> Option<&Arc<dyn ExtensionScriptService>> {
        if self.is_enabled(point) {
            self.service.as_ref()
        } else {
            None
        }
    }

    /// Consult the translation override.
    ///
    /// `build` is only called when the hook is active. A script that reports
    /// "handled" without leaving a principal, or with a blank principal name,
    /// counts as failed.
    pub fn translate<'a, F>(&self, build: F) -> HookOutcome<PrincipalRecord>
    where
        F: FnOnce() -> TranslateAttributesContext<'a>,
    {
        let point = HookPoint::Translation;
        let Some(service) = self.active_service(point) else {
            return HookOutcome::Disabled;
        };

        let mut context = build();
        match Self::guarded(point, || service.invoke_translate(&mut context)) {
            Ok(true) => match context.principal.take() {
                Some(principal) if !principal.principal_name.trim().is_empty() => {
                    tracing::debug!(
                        hook = %point,
                        conversation = %context.conversation_key,
                        "Extension hook handled translation"
                    );
                    HookOutcome::Handled(principal)
                }
                Some(_) | None => Self::failed(
                    point,
                    HookError::NoResult {
                        hook: point.as_str().to_owned(),
                    },
                ),
            },
            Ok(false) => HookOutcome::Declined,
            Err(e) => Self::failed(point, e),
        }
    }

    /// Consult the attribute-release override. `build` is only called when
    /// the hook is active.
    pub fn release_attributes<'a, F>(&self, build: F) -> HookOutcome<()>
    where
        F: FnOnce() -> ReleaseAttributesContext<'a>,
    {
        let point = HookPoint::AttributeRelease;
        let Some(service) = self.active_service(point) else {
            return HookOutcome::Disabled;
        };

        let mut context = build();
        match Self::guarded(point, || service.invoke_attribute_release(&mut context)) {
            Ok(true) => HookOutcome::Handled(()),
            Ok(false) => HookOutcome::Declined,
            Err(e) => Self::failed(point, e),
        }
    }

    /// Run a script call, turning a panic into [`HookError::Panicked`].
    fn guarded<F>(point: HookPoint, call: F) -> Result<bool, HookError>
    where
        F: FnOnce() -> Result<bool, HookError>,
    {
        panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|_| {
            Err(HookError::Panicked {
                hook: point.as_str().to_owned(),
            })
        })
    }

    fn failed<T>(point: HookPoint, error: HookError) -> HookOutcome<T> {
        tracing::warn!(hook = %point, error = %error, "Extension hook failed, using default logic");
        HookOutcome::Failed(error)
    }
}
