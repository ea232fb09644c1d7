use serde::Serialize;
use tracing::{error, warn};

use crate::config::MailConfig;

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    html_content: String,
}

/// Transactional mail over the provider's HTTP API. Sends are best-effort:
/// every failure is logged and swallowed so a broken mail provider never
/// fails the request that triggered the send.
pub struct Mailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    sender_email: String,
    sender_name: String,
}

impl Mailer {
    pub fn new(http: reqwest::Client, config: &MailConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.sender_email.trim().is_empty()
    }

    pub async fn send_verification_email(&self, to_email: &str, verify_link: &str) {
        if !self.is_configured() {
            // Dev mode: keep registration usable without a mail provider.
            warn!(
                "mail provider not configured; verification link for {}: {}",
                to_email, verify_link
            );
            return;
        }

        let body = SendEmailBody {
            sender: EmailAddress {
                email: self.sender_email.clone(),
                name: Some(self.sender_name.clone()),
            },
            to: vec![EmailAddress {
                email: to_email.to_string(),
                name: None,
            }],
            subject: "Verify Your RepForge Account".to_string(),
            html_content: build_verification_html(verify_link),
        };

        let result = self
            .http
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("verification email queued for {}", to_email);
            }
            Ok(resp) => {
                let status = resp.status();
                let detail = resp.text().await.unwrap_or_default();
                error!(
                    "mail provider rejected verification email for {}: {} {}",
                    to_email, status, detail
                );
            }
            Err(e) => {
                error!("failed to reach mail provider for {}: {}", to_email, e);
            }
        }
    }
}

/// Branded dark-theme verification email, assembled by hand. Tables and
/// inline styles only; email clients ignore almost everything else.
pub fn build_verification_html(verify_link: &str) -> String {
    let mut html = String::new();
    html.push_str("<html>");
    html.push_str("<head>");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">");
    html.push_str("<meta http-equiv=\"Content-Type\" content=\"text/html; charset=UTF-8\">");
    html.push_str("</head>");
    html.push_str("<body style=\"font-family: Helvetica, Arial, sans-serif; margin: 0; padding: 0; background-color: #0a0a0a;\">");
    html.push_str("<table role=\"presentation\" style=\"width: 100%; border-collapse: collapse; background-color: #0a0a0a;\"><tr>");
    html.push_str("<td align=\"center\" style=\"padding: 40px 0;\">");
    html.push_str("<table role=\"presentation\" style=\"width: 600px; max-width: 90%; border-collapse: collapse; background-color: #161616; border-radius: 8px;\">");
    html.push_str("<tr><td style=\"padding: 0;\"><div style=\"height: 6px; background: linear-gradient(to right, #ff5e00, #cc4400); border-radius: 8px 8px 0 0;\"></div></td></tr>");
    html.push_str("<tr><td style=\"padding: 30px 40px; text-align: center;\">");
    html.push_str("<h1 style=\"color: #ffffff; font-size: 28px; font-weight: 700; margin: 0 0 15px 0; text-transform: uppercase;\">Forge Your First Rep</h1>");
    html.push_str("<div style=\"height: 4px; width: 60px; background: linear-gradient(to right, #ff5e00, #cc4400); margin: 0 auto 25px auto;\"></div>");
    html.push_str("<p style=\"color: #cccccc; font-size: 16px; line-height: 24px; margin: 0 0 25px 0;\">Thanks for joining RepForge. To complete your registration and start logging your training, please verify your email address:</p>");
    html.push_str("<div style=\"margin: 30px 0;\">");
    html.push_str(&format!(
        "<a href=\"{}\" style=\"display: inline-block; background: linear-gradient(to right, #ff5e00, #cc4400); color: white; font-weight: 600; text-decoration: none; padding: 12px 30px; border-radius: 4px; font-size: 16px; text-transform: uppercase;\">Activate Account</a>",
        verify_link
    ));
    html.push_str("</div>");
    html.push_str("<p style=\"color: #999999; font-size: 14px; line-height: 22px; margin: 0 0 15px 0;\">This verification link will expire in 24 hours. If you did not create an account with us, you can safely ignore this email.</p>");
    html.push_str("<hr style=\"border: 0; border-top: 1px solid #333333; margin: 30px 0;\">");
    html.push_str("<p style=\"color: #777777; font-size: 13px; line-height: 20px; margin: 0;\">If the button above doesn't work, copy and paste this link into your browser:</p>");
    html.push_str(&format!(
        "<p style=\"color: #999999; font-size: 13px; line-height: 20px; margin: 5px 0 0 0; word-break: break-all;\"><a href=\"{}\" style=\"color: #ff7a33; text-decoration: none;\">{}</a></p>",
        verify_link, verify_link
    ));
    html.push_str("</td></tr>");
    html.push_str("<tr><td style=\"background-color: #101010; padding: 20px; text-align: center; border-radius: 0 0 8px 8px;\">");
    html.push_str("<p style=\"color: #777777; font-size: 13px; margin: 0;\">RepForge. Every rep counts.</p>");
    html.push_str("</td></tr>");
    html.push_str("</table></td></tr></table>");
    html.push_str("</body></html>");
    html
}
