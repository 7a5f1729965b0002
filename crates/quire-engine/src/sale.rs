//! # Sale Transaction Processor
//!
//! Multi-line sales with all-or-nothing stock effects.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      create_sale(t, header, lines)                      │
//! │                                                                         │
//! │  1. VALIDATE (no writes)                                               │
//! │     ├── shape: ≥1 line, quantities > 0, email, status                  │
//! │     ├── every line has a stock record ── else NotFound (line i)        │
//! │     └── price lines, total, change                                     │
//! │                                                                         │
//! │  2. DEBIT in submission order                                          │
//! │     line i ── ledger.adjust_once(-qty, "sale:{id}:line:{i}")           │
//! │        ├── ok  ─► record undo (credit +qty)                            │
//! │        └── err ─► compensate lines i-1..0, return err (line i)         │
//! │                                                                         │
//! │  3. PERSIST header + items (one storage transaction)                   │
//! │        └── err ─► compensate every debit, return err                   │
//! │                                                                         │
//! │  A sale is visible only once its stock is debited.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use quire_core::sale::{
    change_due, price_line, sale_total, validate_sale_request, PricedLine, SaleHeader, SaleLine,
};
use quire_core::validation::validate_required;
use quire_core::{Sale, SaleDetail, SaleItem, SaleStatus, StockRecord};

use crate::config::LedgerSettings;
use crate::error::{EngineError, EngineResult};
use crate::ledger::StockLedger;
use crate::saga::Compensations;
use crate::store::SaleStore;

#[derive(Clone)]
pub struct SaleProcessor {
    ledger: StockLedger,
    sales: Arc<dyn SaleStore>,
    compensation_attempts: u32,
    debit_conflict_retries: u32,
}

impl SaleProcessor {
    pub fn new(ledger: StockLedger, sales: Arc<dyn SaleStore>, settings: &LedgerSettings) -> Self {
        SaleProcessor {
            ledger,
            sales,
            compensation_attempts: settings.compensation_attempts,
            debit_conflict_retries: settings.debit_conflict_retries,
        }
    }

    /// Records a sale and debits its stock.
    ///
    /// ## Errors
    /// - `Validation` for a malformed request (nothing written)
    /// - `NotFound` / `InsufficientStock` naming the failing line; debits
    ///   of earlier lines are reversed first
    /// - `Conflict` if a line's stock changed concurrently more often than
    ///   the configured retries allow
    pub async fn create_sale(
        &self,
        tenant_id: &str,
        header: &SaleHeader,
        lines: &[SaleLine],
    ) -> EngineResult<SaleDetail> {
        validate_required("tenant_id", tenant_id)?;
        validate_sale_request(header, lines)?;

        let mut priced = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            let record = self
                .ledger
                .get(tenant_id, &line.edition_id)
                .await
                .map_err(|e| e.at_line(index))?;
            priced.push(price_line(index, line, record.sale_price())?);
        }

        let total = sale_total(&priced)?;
        let change = change_due(header.status, total, header.payment.amount_received)?;
        if let Some(declared) = header.declared_total {
            if declared != total {
                warn!(
                    tenant_id,
                    declared = declared.cents(),
                    computed = total.cents(),
                    "Ignoring caller-supplied sale total"
                );
            }
        }

        let sale_id = Uuid::new_v4().to_string();
        debug!(tenant_id, sale_id = %sale_id, lines = priced.len(), "Debiting sale lines");

        let mut undo = Compensations::new("create_sale", self.compensation_attempts);
        for line in &priced {
            let key = line_key(&sale_id, line.line_no);
            if let Err(e) = self.debit(tenant_id, line, &key).await {
                let err = e.at_line(line.line_no as usize);
                warn!(
                    tenant_id,
                    sale_id = %sale_id,
                    line = line.line_no,
                    error = %err,
                    "Sale line failed, reversing earlier debits"
                );
                roll_back(undo, &sale_id).await;
                return Err(err);
            }
            undo.record(
                format!("credit line {}", line.line_no),
                self.ledger
                    .undo_step(tenant_id, &line.edition_id, line.quantity, format!("{}:undo", key)),
            );
        }

        let now = Utc::now();
        let sale = Sale {
            id: sale_id.clone(),
            tenant_id: tenant_id.to_string(),
            status: header.status,
            payment_method: header.payment.method,
            amount_received_cents: header.payment.amount_received.map(|m| m.cents()),
            change_given_cents: change.map(|m| m.cents()),
            total_amount_cents: total.cents(),
            customer_name: header.customer.name.clone(),
            customer_phone: header.customer.phone.clone(),
            customer_email: header.customer.email.clone(),
            sold_at: now,
            updated_at: now,
        };
        let items: Vec<SaleItem> = priced.iter().map(|line| sale_item(&sale_id, line)).collect();

        if let Err(e) = self.sales.insert_sale(&sale, &items).await {
            warn!(tenant_id, sale_id = %sale_id, error = %e, "Sale insert failed, reversing debits");
            roll_back(undo, &sale_id).await;
            return Err(e.into());
        }
        undo.commit();

        info!(
            tenant_id,
            sale_id = %sale_id,
            items = items.len(),
            total = total.cents(),
            status = %sale.status,
            "Sale recorded"
        );
        Ok(SaleDetail { sale, items })
    }

    pub async fn get_sale(&self, tenant_id: &str, sale_id: &str) -> EngineResult<SaleDetail> {
        let sale = self.load(tenant_id, sale_id).await?;
        let items = self.sales.get_sale_items(&sale.id).await?;
        Ok(SaleDetail { sale, items })
    }

    /// Moves a sale to `to`; cancelling returns its stock.
    pub async fn transition(&self, tenant_id: &str, sale_id: &str, to: SaleStatus) -> EngineResult<Sale> {
        match to {
            SaleStatus::Cancelled => self.cancel_sale(tenant_id, sale_id).await,
            _ => self.set_status(tenant_id, sale_id, to).await,
        }
    }

    pub async fn mark_paid(&self, tenant_id: &str, sale_id: &str) -> EngineResult<Sale> {
        self.set_status(tenant_id, sale_id, SaleStatus::Paid).await
    }

    /// Cancels a sale and credits every sold quantity back.
    ///
    /// Restock credits are keyed per sale line, so a cancel that failed part
    /// way can be repeated, and two racing cancels credit once.
    ///
    /// ## Errors
    /// - `InvalidStatusTransition` if the sale is already cancelled
    /// - `CompensationFailure` if a restock still fails after retries; the
    ///   sale keeps its status
    pub async fn cancel_sale(&self, tenant_id: &str, sale_id: &str) -> EngineResult<Sale> {
        let detail = self.get_sale(tenant_id, sale_id).await?;
        detail.sale.status.transition(SaleStatus::Cancelled)?;

        let mut restock = Compensations::new("cancel_sale", self.compensation_attempts);
        for item in &detail.items {
            restock.record(
                format!("restock line {}", item.line_no),
                self.ledger.undo_step(
                    tenant_id,
                    &item.edition_id,
                    item.quantity_sold,
                    format!("{}:restock", line_key(&detail.sale.id, item.line_no)),
                ),
            );
        }
        if let Some(failed) = restock.compensate().await.into_iter().next() {
            return Err(failed.into_error());
        }

        let sale = self.set_status(tenant_id, sale_id, SaleStatus::Cancelled).await?;
        info!(tenant_id, sale_id, items = detail.items.len(), "Sale cancelled, stock returned");
        Ok(sale)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn load(&self, tenant_id: &str, sale_id: &str) -> EngineResult<Sale> {
        self.sales
            .get_sale(tenant_id, sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))
    }

    /// Guarded status update that follows concurrent moves.
    ///
    /// Statuses only move forward, so this terminates.
    async fn set_status(&self, tenant_id: &str, sale_id: &str, to: SaleStatus) -> EngineResult<Sale> {
        loop {
            let current = self.load(tenant_id, sale_id).await?;
            current.status.transition(to)?;
            if self
                .sales
                .update_sale_status(tenant_id, sale_id, current.status, to)
                .await?
            {
                debug!(tenant_id, sale_id, from = %current.status, to = %to, "Sale status changed");
                return self.load(tenant_id, sale_id).await;
            }
        }
    }

    async fn debit(&self, tenant_id: &str, line: &PricedLine, key: &str) -> EngineResult<StockRecord> {
        let mut retries = 0;
        loop {
            match self
                .ledger
                .adjust_once(tenant_id, &line.edition_id, -line.quantity, key)
                .await
            {
                Err(EngineError::Conflict { .. }) if retries < self.debit_conflict_retries => {
                    retries += 1;
                    debug!(tenant_id, edition_id = %line.edition_id, retries, "Debit conflict, retrying");
                }
                other => return other,
            }
        }
    }
}

impl std::fmt::Debug for SaleProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleProcessor")
            .field("compensation_attempts", &self.compensation_attempts)
            .field("debit_conflict_retries", &self.debit_conflict_retries)
            .finish_non_exhaustive()
    }
}

fn line_key(sale_id: &str, line_no: i64) -> String {
    format!("sale:{}:line:{}", sale_id, line_no)
}

fn sale_item(sale_id: &str, line: &PricedLine) -> SaleItem {
    SaleItem {
        id: Uuid::new_v4().to_string(),
        sale_id: sale_id.to_string(),
        line_no: line.line_no,
        edition_id: line.edition_id.clone(),
        quantity_sold: line.quantity,
        unit_price_cents: line.unit_price.cents(),
        tax_cents: line.tax.map(|m| m.cents()),
        discount_cents: line.discount.map(|m| m.cents()),
        line_total_cents: line.line_total.cents(),
        created_at: Utc::now(),
    }
}

async fn roll_back(undo: Compensations, sale_id: &str) {
    let failures = undo.compensate().await;
    if !failures.is_empty() {
        error!(
            sale_id,
            failed = failures.len(),
            "Sale debits not fully reversed; stock is short until corrected"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
