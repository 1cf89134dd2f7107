use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::user_allowances::UserAllowanceEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillingSplit {
    pub free_items: i64,
    pub paid_items: i64,
    pub total_cents: i64,
}

/// Splits a request into the part covered by the free allowance and the part that
/// has to be paid for. Negative inputs are treated as zero.
pub fn split_billing(requested_items: i64, remaining_free: i64, unit_price_cents: i64) -> BillingSplit {
    let requested_items = requested_items.max(0);
    let free_items = requested_items.min(remaining_free.max(0));
    let paid_items = requested_items - free_items;

    BillingSplit {
        free_items,
        paid_items,
        total_cents: paid_items.saturating_mul(unit_price_cents),
    }
}

/// Usage after consuming `count` more free generations, saturating at `limit`.
pub fn capped_usage(used: i32, count: i32, limit: i32) -> i32 {
    used.saturating_add(count.max(0)).min(limit).max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllowanceStatus {
    pub used: i32,
    pub remaining: i32,
    pub limit: i32,
}

impl AllowanceStatus {
    /// A missing ledger row means the user has not generated anything yet.
    pub fn from_entity(entity: Option<&UserAllowanceEntity>, default_limit: i32) -> Self {
        match entity {
            Some(entity) => Self::new(entity.free_generations_used, entity.generation_limit),
            None => Self::new(0, default_limit),
        }
    }

    pub fn new(used: i32, limit: i32) -> Self {
        Self {
            used,
            remaining: (limit - used).max(0),
            limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreflightReason {
    OwnApiKey,
    FreeTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightResponse {
    pub requires_payment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<PreflightReason>,
    pub remaining_free_generations: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_to_charge: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
}

impl PreflightResponse {
    pub fn own_api_key(remaining_free_generations: i32) -> Self {
        Self {
            requires_payment: false,
            reason: Some(PreflightReason::OwnApiKey),
            remaining_free_generations,
            items_to_charge: None,
            amount_cents: None,
        }
    }

    pub fn from_split(split: BillingSplit, remaining_free_generations: i32) -> Self {
        if split.paid_items == 0 {
            return Self {
                requires_payment: false,
                reason: Some(PreflightReason::FreeTier),
                remaining_free_generations,
                items_to_charge: None,
                amount_cents: None,
            };
        }

        Self {
            requires_payment: true,
            reason: None,
            remaining_free_generations,
            items_to_charge: Some(split.paid_items),
            amount_cents: Some(split.total_cents),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightRequest {
    pub collection_id: Uuid,
    pub item_count: i64,
}
