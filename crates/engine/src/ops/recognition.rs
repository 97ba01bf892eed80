use chrono::Utc;

use crate::{EngineError, Recognizer, ResultEngine, Transaction, parse_recognized, system_prompt};

use super::Engine;

impl Engine {
    /// Recognises `text` written by `user_id` and stores the result.
    ///
    /// Any recognizer failure, unreadable answer or share breakdown that does
    /// not reconcile with the total is reported as
    /// [`EngineError::RecognitionFailed`]; nothing is written in that case.
    pub async fn record_from_text(
        &self,
        recognizer: &dyn Recognizer,
        user_id: &str,
        text: &str,
    ) -> ResultEngine<Transaction> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidInput("message is empty".to_string()));
        }

        let me = self.user(user_id).await?;
        let counterpart = self.counterpart_of(&me.id).await?.map(|user| user.id);
        let prompt = system_prompt(&me.id, counterpart.as_deref());

        let content = recognizer.recognize(&prompt, text).await.map_err(|err| {
            tracing::error!("recognizer call failed: {err}");
            EngineError::RecognitionFailed("recognizer unavailable".to_string())
        })?;

        let cmd = parse_recognized(&content, text, &me.id, counterpart.as_deref(), Utc::now())
            .inspect_err(|err| tracing::warn!(%err, "unusable recognizer answer"))?;

        self.create_transaction(cmd).await.map_err(|err| match err {
            EngineError::InvalidAmount(reason) | EngineError::InvalidSplit(reason) => {
                tracing::warn!(%reason, "recognized shares rejected");
                EngineError::RecognitionFailed(reason)
            }
            other => other,
        })
    }
}
