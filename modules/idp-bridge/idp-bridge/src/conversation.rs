use std::sync::Arc;

use idp_bridge_sdk::{ConversationKey, HostError, SamlHost};
use url::Url;

/// Scoped handle on a host external-authentication conversation.
///
/// The conversation is finished exactly once: explicitly through
/// [`finish`](Self::finish), or on drop if the handling path bailed out
/// early (error return, panic, or a cancelled request future).
/// [`keep_open`](Self::keep_open) hands the conversation over to the next
/// request instead.
pub struct ConversationGuard {
    host: Arc<dyn SamlHost>,
    conversation_id: String,
    key: ConversationKey,
    finished: bool,
}

impl std::fmt::Debug for ConversationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationGuard")
            .field("conversation_id", &self.conversation_id)
            .field("key", &self.key)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl ConversationGuard {
    /// Begin the conversation for `conversation_id`.
    ///
    /// # Errors
    /// Returns the host's error if the conversation cannot be started.
    pub fn start(host: Arc<dyn SamlHost>, conversation_id: &str) -> Result<Self, HostError> {
        let key = host.start_conversation(conversation_id)?;
        tracing::debug!(conversation = %key, "External authentication conversation started");
        Ok(Self {
            host,
            conversation_id: conversation_id.to_owned(),
            key,
            finished: false,
        })
    }

    #[must_use]
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Conversation id as the host first issued it.
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Leave the conversation open (the browser is being sent to the
    /// provider and will come back to it). Returns its key.
    #[must_use]
    pub fn keep_open(mut self) -> ConversationKey {
        self.finished = true;
        self.key.clone()
    }

    /// Finish the conversation and return the host's resume location.
    ///
    /// # Errors
    /// Returns the host's error if the conversation cannot be closed. The
    /// conversation is not retried on drop in that case.
    pub fn finish(mut self) -> Result<Url, HostError> {
        self.finished = true;
        let location = self.host.finish_conversation(&self.key)?;
        tracing::debug!(conversation = %self.key, "External authentication conversation finished");
        Ok(location)
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        match self.host.finish_conversation(&self.key) {
            Ok(_) => tracing::debug!(
                conversation = %self.key,
                "External authentication conversation finished on early exit"
            ),
            Err(e) => tracing::error!(
                conversation = %self.key,
                error = %e,
                "Failed to finish external authentication conversation"
            ),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use idp_bridge_sdk::{AuthnRequestInfo, AuthnResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHost {
        finished: AtomicUsize,
    }

    impl SamlHost for CountingHost {
        fn start_conversation(&self, conversation_id: &str) -> Result<ConversationKey, HostError> {
            if conversation_id == "unknown" {
                return Err(HostError::MissingConversation(conversation_id.to_owned()));
            }
            Ok(ConversationKey::new(format!("key-{conversation_id}")))
        }

        fn authn_request(&self, _: &ConversationKey) -> Result<AuthnRequestInfo, HostError> {
            Ok(AuthnRequestInfo::default())
        }

        fn complete(&self, _: &ConversationKey, _: AuthnResult) -> Result<(), HostError> {
            Ok(())
        }

        fn finish_conversation(&self, key: &ConversationKey) -> Result<Url, HostError> {
            self.finished.fetch_add(1, Ordering::SeqCst);
            Url::parse(&format!("https://idp.example.com/resume/{key}"))
                .map_err(|e| HostError::Internal(e.to_string()))
        }
    }

    #[test]
    fn test_explicit_finish_runs_once() {
        let host = Arc::new(CountingHost::default());
        let guard = ConversationGuard::start(host.clone(), "e1s1").unwrap();
        assert_eq!(guard.key().as_str(), "key-e1s1");

        let location = guard.finish().unwrap();
        assert_eq!(location.path(), "/resume/key-e1s1");
        assert_eq!(host.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_finishes_abandoned_conversation() {
        let host = Arc::new(CountingHost::default());
        {
            let _guard = ConversationGuard::start(host.clone(), "e1s1").unwrap();
        }
        assert_eq!(host.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_keep_open_skips_finish() {
        let host = Arc::new(CountingHost::default());
        let guard = ConversationGuard::start(host.clone(), "e1s1").unwrap();
        assert_eq!(guard.conversation_id(), "e1s1");

        let key = guard.keep_open();
        assert_eq!(key.as_str(), "key-e1s1");
        assert_eq!(host.finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_start_has_nothing_to_finish() {
        let host = Arc::new(CountingHost::default());
        let result = ConversationGuard::start(host.clone(), "unknown");
        assert!(matches!(result, Err(HostError::MissingConversation(_))));
        assert_eq!(host.finished.load(Ordering::SeqCst), 0);
    }
}
