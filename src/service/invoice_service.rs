use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    domain::{
        FeeBasis, Invoice, InvoiceItem, InvoiceItemType, InvoiceStatus, NewInvoiceItem,
        PayerInvoiceResult,
    },
    error::{AppError, Result},
    repository::{InvoiceRepository, MemberRepository},
    service::fee_service::FeeService,
};

pub struct InvoiceService {
    invoice_repo: Arc<dyn InvoiceRepository>,
    member_repo: Arc<dyn MemberRepository>,
    fee_service: Arc<FeeService>,
}

impl InvoiceService {
    pub fn new(
        invoice_repo: Arc<dyn InvoiceRepository>,
        member_repo: Arc<dyn MemberRepository>,
        fee_service: Arc<FeeService>,
    ) -> Self {
        Self {
            invoice_repo,
            member_repo,
            fee_service,
        }
    }

    /// One invoice for one payer and one billing period. Fees come from
    /// the resolver; members resolving to zero are skipped. Fails with
    /// a conflict when the period is already invoiced and with a bad
    /// request when nothing remains to bill.
    pub async fn generate_for_payer(
        &self,
        club_id: Uuid,
        payer_id: Uuid,
        month: u32,
        year: i32,
        due_date: NaiveDate,
    ) -> Result<Invoice> {
        validate_period(month, year)?;

        // Friendly error on the common path; the UNIQUE index in the
        // database catches the race two overlapping runs can hit.
        if self
            .invoice_repo
            .find_by_period(club_id, payer_id, month, year)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "An invoice already exists for this payer for {}/{}",
                month, year
            )));
        }

        let members = self
            .member_repo
            .list_active_by_guardian(club_id, payer_id)
            .await?;
        if members.is_empty() {
            return Err(AppError::BadRequest(
                "Payer has no active members to invoice".to_string(),
            ));
        }

        let invoice_id = Uuid::new_v4();
        let mut items = Vec::new();

        for member in &members {
            let fee = self.fee_service.effective_fee_for(member, month, year).await?;
            if fee.degraded {
                tracing::warn!(
                    member_id = %member.id,
                    amount_cents = fee.amount_cents,
                    "billing degraded fee for member"
                );
            }
            if fee.amount_cents == 0 {
                continue;
            }

            let description = match (&fee.basis, &fee.note) {
                (FeeBasis::TemporaryAdjustment, Some(note)) => {
                    format!("Monthly fee - {} ({})", member.full_name(), note)
                }
                _ => format!("Monthly fee - {}", member.full_name()),
            };

            items.push(InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id,
                member_id: Some(member.id),
                description,
                item_type: InvoiceItemType::MonthlyFee,
                unit_amount_cents: fee.amount_cents,
                quantity: 1,
                created_at: Utc::now(),
            });
        }

        if items.is_empty() {
            return Err(AppError::BadRequest(
                "Nothing to invoice for this payer".to_string(),
            ));
        }

        let subtotal_cents: i64 = items.iter().map(|i| i.line_total_cents()).sum();
        let sequence = self.invoice_repo.count_for_period(club_id, year, month).await? + 1;

        let invoice = Invoice {
            id: invoice_id,
            club_id,
            payer_id,
            invoice_number: format!("INV-{}{:02}-{:04}", year, month, sequence),
            month,
            year,
            status: InvoiceStatus::Pending,
            due_date,
            subtotal_cents,
            discount_cents: 0,
            total_cents: subtotal_cents,
            paid_at: None,
            paid_amount_cents: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.invoice_repo.create_with_items(invoice, items).await
    }

    /// Club-wide run: every payer with at least one active member gets
    /// an independent attempt. One payer failing (typically an already
    /// invoiced period) never aborts the rest of the batch.
    pub async fn generate_for_club(
        &self,
        club_id: Uuid,
        month: u32,
        year: i32,
        due_date: NaiveDate,
    ) -> Result<Vec<PayerInvoiceResult>> {
        validate_period(month, year)?;

        let payers = self.member_repo.list_billable_guardians(club_id).await?;
        let mut results = Vec::with_capacity(payers.len());

        for payer_id in payers {
            match self
                .generate_for_payer(club_id, payer_id, month, year, due_date)
                .await
            {
                Ok(invoice) => results.push(PayerInvoiceResult {
                    payer_id,
                    invoice_id: Some(invoice.id),
                    error: None,
                }),
                Err(e) => {
                    tracing::warn!(%payer_id, error = %e, "invoice generation failed for payer");
                    results.push(PayerInvoiceResult {
                        payer_id,
                        invoice_id: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(results)
    }

    pub async fn get_with_items(
        &self,
        club_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<(Invoice, Vec<InvoiceItem>)> {
        let invoice = self
            .invoice_repo
            .find_by_id(club_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;
        let items = self.invoice_repo.list_items(invoice_id).await?;
        Ok((invoice, items))
    }

    pub async fn add_item(
        &self,
        club_id: Uuid,
        invoice_id: Uuid,
        new_item: NewInvoiceItem,
    ) -> Result<Invoice> {
        let invoice = self.editable_invoice(club_id, invoice_id).await?;

        if new_item.quantity <= 0 {
            return Err(AppError::Validation("Quantity must be positive".to_string()));
        }

        self.invoice_repo
            .add_item(InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id,
                member_id: new_item.member_id,
                description: new_item.description,
                item_type: new_item.item_type,
                unit_amount_cents: new_item.unit_amount_cents,
                quantity: new_item.quantity,
                created_at: Utc::now(),
            })
            .await?;

        self.recompute_totals(&invoice).await
    }

    pub async fn remove_item(
        &self,
        club_id: Uuid,
        invoice_id: Uuid,
        item_id: Uuid,
    ) -> Result<Invoice> {
        let invoice = self.editable_invoice(club_id, invoice_id).await?;
        self.invoice_repo.delete_item(invoice_id, item_id).await?;
        self.recompute_totals(&invoice).await
    }

    pub async fn set_discount(
        &self,
        club_id: Uuid,
        invoice_id: Uuid,
        discount_cents: i64,
    ) -> Result<Invoice> {
        if discount_cents < 0 {
            return Err(AppError::Validation("Discount cannot be negative".to_string()));
        }

        let mut invoice = self.editable_invoice(club_id, invoice_id).await?;
        invoice.discount_cents = discount_cents;
        self.recompute_totals(&invoice).await
    }

    pub async fn cancel(&self, club_id: Uuid, invoice_id: Uuid) -> Result<Invoice> {
        let invoice = self
            .invoice_repo
            .find_by_id(club_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;

        if invoice.status == InvoiceStatus::Paid {
            return Err(AppError::Conflict(
                "Paid invoices cannot be cancelled".to_string(),
            ));
        }

        self.invoice_repo
            .set_status(invoice_id, InvoiceStatus::Cancelled)
            .await
    }

    /// Flags pending invoices past their due date. Run from the admin
    /// surface; invoices flip back to Paid only through reconciliation.
    pub async fn mark_overdue(&self, club_id: Uuid, as_of: NaiveDate) -> Result<Vec<Invoice>> {
        let overdue = self.invoice_repo.list_overdue(club_id, as_of).await?;
        let mut updated = Vec::with_capacity(overdue.len());

        for invoice in overdue {
            updated.push(
                self.invoice_repo
                    .set_status(invoice.id, InvoiceStatus::Overdue)
                    .await?,
            );
        }

        Ok(updated)
    }

    async fn editable_invoice(&self, club_id: Uuid, invoice_id: Uuid) -> Result<Invoice> {
        let invoice = self
            .invoice_repo
            .find_by_id(club_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;

        if !invoice.is_editable() {
            return Err(AppError::Conflict(format!(
                "Invoice {} is not editable",
                invoice.invoice_number
            )));
        }

        Ok(invoice)
    }

    // total always equals subtotal minus discount after any mutation.
    async fn recompute_totals(&self, invoice: &Invoice) -> Result<Invoice> {
        let items = self.invoice_repo.list_items(invoice.id).await?;
        let subtotal_cents: i64 = items.iter().map(|i| i.line_total_cents()).sum();
        let total_cents = subtotal_cents - invoice.discount_cents;

        self.invoice_repo
            .update_totals(invoice.id, subtotal_cents, invoice.discount_cents, total_cents)
            .await
    }
}

fn validate_period(month: u32, year: i32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!("Invalid month: {}", month)));
    }
    if !(2000..=2100).contains(&year) {
        return Err(AppError::Validation(format!("Invalid year: {}", year)));
    }
    Ok(())
}
