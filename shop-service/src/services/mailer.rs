//! Background delivery of invoice confirmation emails.
//!
//! Invoice creation only enqueues. One worker task renders the PDF and hands
//! it to the email provider. Delivery is best effort: a full queue drops the
//! job and a failed send is logged, never retried.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::email::{EmailAttachment, EmailMessage, EmailProvider};
use super::pdf::{invoice_filename, render_invoice_pdf};
use crate::config::ShopProfile;
use crate::models::Invoice;

#[derive(Debug, Clone)]
pub struct InvoiceEmailJob {
    pub to: String,
    pub invoice: Invoice,
}

#[derive(Clone)]
pub struct InvoiceMailer {
    job_tx: mpsc::Sender<InvoiceEmailJob>,
}

impl InvoiceMailer {
    /// Spawn the worker. It exits once every `InvoiceMailer` clone is dropped
    /// and the queue has drained.
    pub fn start(
        email: Arc<dyn EmailProvider>,
        shop: ShopProfile,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (job_tx, mut job_rx) = mpsc::channel::<InvoiceEmailJob>(capacity.max(1));

        let worker = tokio::spawn(async move {
            tracing::info!(capacity, "Invoice mailer started");
            while let Some(job) = job_rx.recv().await {
                deliver(email.as_ref(), &shop, job).await;
            }
            tracing::info!("Invoice mailer queue closed, worker exiting");
        });

        (Self { job_tx }, worker)
    }

    /// Never blocks. Returns `false` when the job was dropped.
    pub fn enqueue(&self, to: String, invoice: Invoice) -> bool {
        let invoice_id = invoice.invoice_id;
        match self.job_tx.try_send(InvoiceEmailJob { to, invoice }) {
            Ok(()) => {
                metrics::counter!("shop_invoice_emails_queued_total").increment(1);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(invoice_id, "Invoice mailer queue full, email dropped");
                metrics::counter!("shop_invoice_emails_dropped_total").increment(1);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(invoice_id, "Invoice mailer is not running, email dropped");
                false
            }
        }
    }
}

#[tracing::instrument(skip_all, fields(invoice_id = job.invoice.invoice_id))]
async fn deliver(email: &dyn EmailProvider, shop: &ShopProfile, job: InvoiceEmailJob) {
    let pdf = match render_invoice_pdf(&job.invoice, shop) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to render invoice PDF for email: {}", e);
            return;
        }
    };

    let message = EmailMessage {
        to: job.to,
        subject: format!("Your Invoice #{}", job.invoice.invoice_id),
        body_text: format!(
            "Dear {},\n\nThank you for shopping at {}. Your invoice is attached.\n\nTotal: {} {}\n",
            job.invoice.customer_name,
            shop.name,
            shop.currency,
            job.invoice.total.round_dp(2)
        ),
        attachments: vec![EmailAttachment::pdf(
            invoice_filename(job.invoice.invoice_id),
            pdf,
        )],
    };

    match email.send(&message).await {
        Ok(message_id) => {
            tracing::info!(message_id = ?message_id, "Invoice email sent");
            metrics::counter!("shop_invoice_emails_sent_total").increment(1);
        }
        Err(e) => {
            tracing::error!("Invoice email failed: {}", e);
            metrics::counter!("shop_invoice_emails_failed_total").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItem;
    use crate::services::MockEmailProvider;
    use chrono::Utc;
    use mongodb::bson::oid::ObjectId;
    use rust_decimal::Decimal;

    fn invoice(id: i64) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: None,
            invoice_id: id,
            customer_name: "Meena".to_string(),
            customer_address: "12 Market Street".to_string(),
            customer_number: "9876543210".to_string(),
            customer_email: Some("meena@example.com".to_string()),
            items: vec![LineItem {
                item_id: ObjectId::new(),
                name: "Rice".to_string(),
                quantity: 2,
                price: Decimal::from(100),
            }],
            subtotal: Decimal::from(200),
            tax: Decimal::from(10),
            discount: Decimal::from(4),
            total: Decimal::from(210),
            tax_rate: Decimal::from(5),
            discount_rate: Decimal::from(2),
            order_date: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn queued_invoice_is_mailed_with_pdf() {
        let email = Arc::new(MockEmailProvider::new(true));
        let (mailer, worker) = InvoiceMailer::start(email.clone(), ShopProfile::default(), 4);

        assert!(mailer.enqueue("meena@example.com".to_string(), invoice(7)));
        drop(mailer);
        worker.await.unwrap();

        let sent = email.last_sent_to("meena@example.com").unwrap();
        assert_eq!(sent.subject, "Your Invoice #7");
        assert_eq!(sent.attachments.len(), 1);
        assert_eq!(sent.attachments[0].filename, "invoice_7.pdf");
        assert!(sent.attachments[0].data.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn failed_send_is_swallowed() {
        let email = Arc::new(MockEmailProvider::new(true));
        email.fail_sends(true);
        let (mailer, worker) = InvoiceMailer::start(email.clone(), ShopProfile::default(), 4);

        assert!(mailer.enqueue("meena@example.com".to_string(), invoice(1)));
        drop(mailer);
        worker.await.unwrap();
        assert_eq!(email.send_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (job_tx, _job_rx) = mpsc::channel(1);
        let mailer = InvoiceMailer { job_tx };

        assert!(mailer.enqueue("a@b.co".to_string(), invoice(1)));
        assert!(!mailer.enqueue("a@b.co".to_string(), invoice(2)));
    }
}
