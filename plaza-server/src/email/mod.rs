//! SMTP alerting for dead-lettered reservations

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::db::BoxError;
use crate::seckill::pipeline::ReservationMessage;

/// Send a plain-text alert for a dead-lettered reservation.
///
/// Port 465 gets implicit TLS; any other port goes through STARTTLS.
pub async fn send_dead_letter_alert(
    cfg: &SmtpConfig,
    msg: &ReservationMessage,
) -> Result<(), BoxError> {
    let subject = format!("[plaza] seckill order {} dead-lettered", msg.order_id);
    let body = format!(
        "A reservation exhausted its retries and was moved to the dead-letter topic.\n\
         \n\
         order id:    {}\n\
         user id:     {}\n\
         voucher id:  {}\n\
         created at:  {} (unix)\n\
         retries:     {}\n\
         last error:  {}\n\
         \n\
         The ephemeral stock has been compensated; reconcile the reservation manually.\n",
        msg.order_id, msg.user_id, msg.voucher_id, msg.created_at, msg.retry_count, msg.last_error
    );

    let email = Message::builder()
        .from(cfg.user.parse()?)
        .to(cfg.to.parse()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)?;

    let creds = Credentials::new(cfg.user.clone(), cfg.pass.clone());
    let mailer: AsyncSmtpTransport<Tokio1Executor> = if cfg.port == 465 {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
            .credentials(creds)
            .build()
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
            .port(cfg.port)
            .credentials(creds)
            .build()
    };

    mailer.send(email).await?;
    tracing::info!(to = %cfg.to, order_id = msg.order_id, "Dead-letter alert sent");
    Ok(())
}
