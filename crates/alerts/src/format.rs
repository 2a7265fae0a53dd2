//! Message formatting for the chat and email channels.

use tracker_core::{AccountId, ChangeEvent, Direction};

/// Format a balance change as an HTML chat message.
pub fn format_chat_message(account: &AccountId, event: &ChangeEvent) -> String {
    let (emoji, verb) = match event.direction {
        Direction::Incoming => ("📥", "received"),
        Direction::Outgoing => ("📤", "sent"),
    };

    let mut msg = format!(
        "{} <b>Transaction Detected!</b>\n\n\
         <b>Account:</b> {}\n\
         <b>Amount:</b> {} ({})\n\
         <b>Old balance:</b> {}\n\
         <b>New balance:</b> {}",
        emoji, account, event.difference, verb, event.old_balance, event.new_balance
    );

    if event.simulated {
        msg.push_str("\n\n<i>Simulated transaction</i>");
    }

    msg.push_str(&format!(
        "\n\n⏰ {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    msg
}

/// Build the subject, plain-text body and HTML body of a change email.
pub fn format_email(account: &AccountId, event: &ChangeEvent) -> (String, String, String) {
    let kind = match event.direction {
        Direction::Incoming => "Incoming",
        Direction::Outgoing => "Outgoing",
    };
    let when = event.timestamp.format("%Y-%m-%d %H:%M:%S UTC");

    let subject = format!("{} transaction on {}", kind, account);

    let text = format!(
        "{} transaction detected on account {}.\n\n\
         Amount: {}\n\
         Old balance: {}\n\
         New balance: {}\n\
         Time: {}\n",
        kind, account, event.difference, event.old_balance, event.new_balance, when
    );

    let html = format!(
        "<h2>{} Transaction Detected</h2>\
         <p><b>Account:</b> {}</p>\
         <p><b>Amount:</b> {}</p>\
         <p><b>Old balance:</b> {}</p>\
         <p><b>New balance:</b> {}</p>\
         <p><b>Time:</b> {}</p>",
        kind, account, event.difference, event.old_balance, event.new_balance, when
    );

    (subject, text, html)
}
