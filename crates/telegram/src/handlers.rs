use {
    intake_core::{Attachment, IntakeController, PendingMessage, ReplyTarget},
    teloxide::{
        payloads::SendMessageSetters,
        prelude::*,
        types::{MediaKind, MessageKind, ReplyParameters},
    },
    tracing::{debug, info, warn},
};

use crate::Result;

/// Reply to `/start`.
pub const START_BANNER: &str = "👋 UCClaimControl Bulk Upload Bot is running.\n\
     Select multiple files or photos and send with a caption like:\n\n\
     ID001 John Smith";

/// Handle one inbound message: answer `/start`, ignore service messages and
/// hand everything else to the controller.
pub async fn handle_message(msg: Message, bot: &Bot, controller: &IntakeController) -> Result<()> {
    if is_start_command(&msg) {
        debug!(chat_id = msg.chat.id.0, "start command");
        bot.send_message(msg.chat.id, START_BANNER)
            .reply_parameters(ReplyParameters::new(msg.id).allow_sending_without_reply())
            .await?;
        return Ok(());
    }

    if !matches!(msg.kind, MessageKind::Common(_)) {
        debug!(chat_id = msg.chat.id.0, "ignoring service message");
        return Ok(());
    }

    let pending = to_pending_message(&msg);
    debug!(
        chat_id = %pending.reply_to.chat_id,
        group_id = ?pending.group_id,
        kind = pending.attachment.kind(),
        "inbound message"
    );

    match controller.handle(pending).await {
        Ok(Some(report)) => {
            info!(
                chat_id = msg.chat.id.0,
                client_id = %report.client.client_id,
                uploaded = report.uploaded_count(),
                failed = report.failed().count(),
                "single message processed"
            );
        },
        Ok(None) => {},
        Err(e) => {
            warn!(chat_id = msg.chat.id.0, error = %e, "message processing failed");
            return Err(e.into());
        },
    }
    Ok(())
}

/// Map a Telegram message to the transport-neutral form.
pub fn to_pending_message(msg: &Message) -> PendingMessage {
    PendingMessage {
        reply_to: ReplyTarget {
            chat_id: msg.chat.id.0.to_string(),
            message_id: Some(msg.id.0.to_string()),
        },
        group_id: msg.media_group_id().map(ToString::to_string),
        caption: msg.caption().or_else(|| msg.text()).map(ToString::to_string),
        attachment: extract_attachment(msg),
    }
}

fn is_start_command(msg: &Message) -> bool {
    msg.text()
        .and_then(|t| t.split_whitespace().next())
        .is_some_and(|cmd| cmd == "/start" || cmd.starts_with("/start@"))
}

fn extract_attachment(msg: &Message) -> Attachment {
    let MessageKind::Common(common) = &msg.kind else {
        return Attachment::Unsupported {
            kind: "service".into(),
        };
    };
    match &common.media_kind {
        MediaKind::Document(d) => Attachment::Document {
            file_id: d.document.file.id.clone(),
            file_name: d.document.file_name.clone(),
            mime_type: d.document.mime_type.as_ref().map(ToString::to_string),
        },
        // Sizes are ordered smallest first.
        MediaKind::Photo(p) => match p.photo.last() {
            Some(largest) => Attachment::Photo {
                file_id: largest.file.id.clone(),
            },
            None => Attachment::Unsupported {
                kind: "photo".into(),
            },
        },
        other => Attachment::Unsupported {
            kind: describe_media_kind(other).into(),
        },
    }
}

fn describe_media_kind(kind: &MediaKind) -> &'static str {
    match kind {
        MediaKind::Text(_) => "text",
        MediaKind::Animation(_) => "animation",
        MediaKind::Audio(_) => "audio",
        MediaKind::Contact(_) => "contact",
        MediaKind::Document(_) => "document",
        MediaKind::Location(_) => "location",
        MediaKind::Photo(_) => "photo",
        MediaKind::Poll(_) => "poll",
        MediaKind::Sticker(_) => "sticker",
        MediaKind::Venue(_) => "venue",
        MediaKind::Video(_) => "video",
        MediaKind::VideoNote(_) => "video note",
        MediaKind::Voice(_) => "voice",
        _ => "unknown media",
    }
}
