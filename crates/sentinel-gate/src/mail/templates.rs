//! Challenge and confirmation emails, and the verification result pages.

use mail_builder::{MessageBuilder, headers::raw::Raw};
use sentinel_common::{Challenge, SentinelError, constants::headers};

use super::local_part;

pub const CHALLENGE_SUBJECT: &str = "Please Verify Your Email ✉️";
pub const CONFIRMATION_SUBJECT: &str = "✅ Verification Successful - Email Delivered";

/// Inputs for a challenge email
pub struct ChallengeEmail<'a> {
    pub system_name: &'a str,
    pub relay_address: &'a str,
    pub sender: &'a str,
    /// `Message-ID` of the message being challenged
    pub in_reply_to: Option<&'a str>,
    pub challenge: &'a Challenge,
    pub token: &'a str,
    pub public_url: &'a str,
}

/// `{public_url}/verify?token={token}&answer={answer}`
pub fn verification_link(public_url: &str, token: &str, answer: i64) -> String {
    format!(
        "{}/verify?token={}&answer={}",
        public_url.trim_end_matches('/'),
        urlencoding::encode(token),
        answer
    )
}

fn greeting(sender: &str) -> String {
    match local_part(sender) {
        "" => "Hi,".to_string(),
        name => format!("Hi {name},"),
    }
}

impl ChallengeEmail<'_> {
    /// Candidate answers paired with their links
    pub fn choices(&self) -> Vec<(i64, String)> {
        self.challenge
            .candidate_answers()
            .into_iter()
            .map(|answer| (answer, verification_link(self.public_url, self.token, answer)))
            .collect()
    }

    pub fn text(&self) -> String {
        let links: Vec<String> = self
            .choices()
            .into_iter()
            .map(|(answer, link)| format!("• {answer}: {link}"))
            .collect();

        format!(
            "{greeting}\n\n\
             I've received your email and want to make sure it reaches me safely. \
             To prevent spam, I use a simple one-time verification system for new senders.\n\n\
             Your Challenge Question:\n{question}\n\n\
             To verify, click one of these links:\n{links}\n\n\
             Note:\n\
             • This is a one-time verification. Once completed, your future emails will be delivered automatically.\n\
             • This verification link expires in 24 hours.\n\n\
             Thank you for your understanding.",
            greeting = greeting(self.sender),
            question = self.challenge.question,
            links = links.join("\n"),
        )
    }

    pub fn html(&self) -> String {
        let buttons: Vec<String> = self
            .choices()
            .into_iter()
            .map(|(answer, link)| {
                format!(
                    r#"<a href="{link}" style="background-color: #3498db; color: white; padding: 10px 15px; text-decoration: none; border-radius: 5px; text-align: center;">{answer}</a>"#
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Email Verification Required</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background-color: #f8f9fa; border-radius: 5px; padding: 20px; margin-bottom: 20px;">
    <h1 style="color: #2c3e50; margin-top: 0;">Quick Verification Needed</h1>
    <p>{greeting}</p>
    <p>I've received your email and want to make sure it reaches me safely. To prevent spam, I use a simple one-time verification system for new senders.</p>
    <div style="background-color: white; border-left: 4px solid #3498db; padding: 15px; margin: 20px 0;">
      <p style="font-weight: bold; margin-bottom: 10px;">Your Challenge Question:</p>
      <p style="font-size: 18px; color: #2c3e50;">{question}</p>
    </div>
    <p>Click the correct answer below:</p>
    <div style="display: flex; flex-direction: column; gap: 10px;">
      {buttons}
    </div>
    <div style="margin-top: 20px; padding-top: 20px; border-top: 1px solid #eee;">
      <p style="color: #666; font-size: 14px;">ℹ️ This is a one-time verification. Once completed, your future emails will be delivered automatically.</p>
      <p style="color: #666; font-size: 14px;">⏰ This verification link expires in 24 hours.</p>
    </div>
  </div>
</body>
</html>"#,
            greeting = html_escape(&greeting(self.sender)),
            question = html_escape(&self.challenge.question),
            buttons = buttons.join("\n      "),
        )
    }

    pub fn render(&self) -> Result<Vec<u8>, SentinelError> {
        let mut builder = MessageBuilder::new()
            .from((self.system_name, self.relay_address))
            .to(self.sender)
            .subject(CHALLENGE_SUBJECT)
            .text_body(self.text())
            .html_body(self.html());

        if let Some(message_id) = self.in_reply_to {
            builder = builder.header(headers::IN_REPLY_TO, Raw::new(message_id));
        }

        builder
            .write_to_vec()
            .map_err(|e| SentinelError::Internal(format!("failed to render challenge: {e}")))
    }
}

/// Inputs for the confirmation sent after a successful verification
pub struct ConfirmationEmail<'a> {
    pub system_name: &'a str,
    pub relay_address: &'a str,
    pub sender: &'a str,
}

impl ConfirmationEmail<'_> {
    pub fn text(&self) -> String {
        format!(
            "{}\n\n\
             ✅ Your email has been successfully verified and delivered!\n\n\
             You won't need to verify again - all future emails will be delivered automatically.\n\n\
             Thank you for your patience with this security measure.",
            greeting(self.sender)
        )
    }

    pub fn html(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Verification Successful</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background-color: #f8f9fa; border-radius: 5px; padding: 20px;">
    <h1 style="color: #2c3e50; margin-top: 0;">✅ Verification Successful</h1>
    <p>{}</p>
    <div style="background-color: white; border-left: 4px solid #27ae60; padding: 15px; margin: 20px 0;">
      <p>Your email has been successfully verified and delivered!</p>
      <p>You won't need to verify again - all future emails will be delivered automatically.</p>
    </div>
    <p>Thank you for your patience with this security measure.</p>
  </div>
</body>
</html>"#,
            html_escape(&greeting(self.sender))
        )
    }

    pub fn render(&self) -> Result<Vec<u8>, SentinelError> {
        MessageBuilder::new()
            .from((self.system_name, self.relay_address))
            .to(self.sender)
            .subject(CONFIRMATION_SUBJECT)
            .text_body(self.text())
            .html_body(self.html())
            .write_to_vec()
            .map_err(|e| SentinelError::Internal(format!("failed to render confirmation: {e}")))
    }
}

pub const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Verification Successful</title>
    <style>
      body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 40px auto; padding: 20px; }
      .success-card { background-color: #f8f9fa; border-radius: 5px; padding: 20px; text-align: center; }
      .success-icon { font-size: 48px; margin-bottom: 20px; }
      h1 { color: #2c3e50; }
    </style>
  </head>
  <body>
    <div class="success-card">
      <div class="success-icon">✅</div>
      <h1>Verification Successful!</h1>
      <p>Your email has been verified and delivered successfully.</p>
      <p>You won't need to verify again - all future emails will be delivered automatically.</p>
      <p>You can close this window now.</p>
    </div>
  </body>
</html>"#;

pub const INCORRECT_ANSWER_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Incorrect Answer</title>
    <style>
      body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 40px auto; padding: 20px; }
      .error-card { background-color: #fff3f3; border-radius: 5px; padding: 20px; text-align: center; }
      .error-icon { font-size: 48px; margin-bottom: 20px; }
      h1 { color: #e74c3c; }
    </style>
  </head>
  <body>
    <div class="error-card">
      <div class="error-icon">❌</div>
      <h1>Incorrect Answer</h1>
      <p>Please try again by selecting a different answer from your verification email.</p>
    </div>
  </body>
</html>"#;

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
