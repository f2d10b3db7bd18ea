//! Notification and message emission for workflow transitions.
//!
//! Each emission is an independent insert outside the transition's write:
//! callers log and swallow failures so that an audit-trail hiccup never
//! unwinds an already-committed status change, and a failed notification
//! never blocks the companion message (or vice versa).

use chrono::Utc;
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Message, NewMessage, NewNotification, Notification};
use crate::schema::{messages, notifications};

#[derive(Debug, Clone)]
pub struct Emitter;

impl Emitter {
    /// Inserts one unread notification row for the recipient.
    pub fn notify(
        conn: &mut PgConnection,
        status_label: &str,
        user_id: Uuid,
        text: &str,
    ) -> Result<Notification, diesel::result::Error> {
        let notification: Notification = diesel::insert_into(notifications::table)
            .values(&NewNotification {
                status_label: status_label.to_string(),
                user_id,
                message: text.to_string(),
            })
            .returning(Notification::as_returning())
            .get_result(conn)?;

        debug!(notification_id = %notification.id, user_id = %user_id, "Notification emitted");
        Ok(notification)
    }

    /// Inserts one message row correlated to a report, stamped now.
    pub fn message(
        conn: &mut PgConnection,
        report_id: Option<Uuid>,
        sender_id: Uuid,
        recipient_id: Uuid,
        subject: &str,
        body: &str,
    ) -> Result<Message, diesel::result::Error> {
        let message: Message = diesel::insert_into(messages::table)
            .values(&NewMessage {
                report_id,
                sender_id,
                recipient_id,
                subject: subject.to_string(),
                body: body.to_string(),
                scheduled_at: Utc::now().naive_utc(),
                document: String::new(),
            })
            .returning(Message::as_returning())
            .get_result(conn)?;

        debug!(message_id = %message.id, recipient_id = %recipient_id, "Message emitted");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Emitter>();
    }
}
