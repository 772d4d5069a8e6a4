//! Transactional email: the "Order Placed" confirmation.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain-text
//! templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use sdach_core::{Email, OrderId};

use super::checkout::OrderNotifier;
use crate::config::EmailConfig;
use crate::models::PlacedOrder;

/// Subject line of the order confirmation.
pub const ORDER_PLACED_SUBJECT: &str = "Order Placed - Sdach";

/// HTML template for the order confirmation.
#[derive(Template)]
#[template(path = "email/order_placed.html")]
struct OrderPlacedEmailHtml<'a> {
    view: &'a OrderPlacedView,
}

/// Plain text template for the order confirmation.
#[derive(Template)]
#[template(path = "email/order_placed.txt")]
struct OrderPlacedEmailText<'a> {
    view: &'a OrderPlacedView,
}

/// Values shown in the order confirmation.
struct OrderPlacedView {
    customer_name: String,
    order_id: OrderId,
    grand_total: String,
    payment_method: &'static str,
    item_count: u64,
    order_url: String,
}

impl OrderPlacedView {
    fn new(order: &PlacedOrder, base_url: &str) -> Self {
        Self {
            customer_name: order.address.full_name(),
            order_id: order.id,
            grand_total: order.currency.format(order.grand_total),
            payment_method: order.payment_method.label(),
            item_count: order.total_quantity(),
            order_url: format!("{base_url}/orders/{}", order.id),
        }
    }
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message ready to hand to the transport.
struct Rendered {
    subject: &'static str,
    text: String,
    html: String,
}

fn render_order_placed(order: &PlacedOrder, base_url: &str) -> Result<Rendered, EmailError> {
    let view = OrderPlacedView::new(order, base_url);
    Ok(Rendered {
        subject: ORDER_PLACED_SUBJECT,
        text: OrderPlacedEmailText { view: &view }.render()?,
        html: OrderPlacedEmailHtml { view: &view }.render()?,
    })
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: String,
        html_body: String,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Sends order confirmations, or skips them when SMTP is not configured.
#[derive(Clone)]
pub struct OrderMailer {
    email: Option<EmailService>,
    base_url: String,
}

impl OrderMailer {
    #[must_use]
    pub const fn new(email: Option<EmailService>, base_url: String) -> Self {
        Self { email, base_url }
    }
}

impl OrderNotifier for OrderMailer {
    /// Render the confirmation and send it on a background task.
    ///
    /// Only rendering errors are returned; delivery failures are logged by
    /// the task.
    async fn order_placed(&self, order: &PlacedOrder, to: &Email) -> Result<(), EmailError> {
        let Some(service) = self.email.clone() else {
            tracing::debug!(order_id = %order.id, "SMTP not configured, skipping order email");
            return Ok(());
        };

        let rendered = render_order_placed(order, &self.base_url)?;
        let to = to.to_string();
        let order_id = order.id;

        tokio::spawn(async move {
            if let Err(e) = service
                .send_multipart_email(&to, rendered.subject, rendered.text, rendered.html)
                .await
            {
                tracing::warn!(%order_id, error = %e, "Failed to send order confirmation");
            }
        });

        Ok(())
    }
}
