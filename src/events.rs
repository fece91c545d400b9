// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Post-commit hooks: the event sink and cache invalidation interfaces.
//!
//! Hooks run only after the backing store has confirmed a commit, at most
//! once per applied mutation. A rolled-back operation fires nothing, and an
//! idempotent replay fires nothing (its hooks already ran when the original
//! request committed).

use crate::base::{TransactionId, WalletId};
use crate::wallet::Wallet;
use crossbeam::queue::SegQueue;
use serde::Serialize;

/// Events emitted after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WalletEvent {
    /// A deposit or transfer-in leg committed.
    WalletCredited {
        wallet_id: WalletId,
        transaction_id: TransactionId,
    },
    /// A withdrawal committed.
    WalletDebited {
        wallet_id: WalletId,
        transaction_id: TransactionId,
    },
    /// Both legs of a transfer committed atomically.
    TransferSucceeded {
        sender_wallet_id: WalletId,
        receiver_wallet_id: WalletId,
        sender_transaction_id: TransactionId,
        receiver_transaction_id: TransactionId,
    },
}

/// Abstract notification point consumed after a commit.
///
/// Delivery mechanics (queues, webhooks, brokers) live outside this crate;
/// the engine only guarantees when `dispatch` is called and with what
/// payload.
pub trait EventSink: Send + Sync {
    fn dispatch(&self, event: WalletEvent);
}

/// Read-through cache refresh hook, invoked after a commit.
pub trait WalletCache: Send + Sync {
    /// Drops any cached state for the wallet.
    fn forget(&self, wallet_id: WalletId);

    /// Repopulates the cache from a fresh post-commit snapshot.
    fn refresh(&self, wallet: &Wallet);
}

/// Sink that drops every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn dispatch(&self, _event: WalletEvent) {}
}

/// Cache hook that does nothing.
#[derive(Debug, Default)]
pub struct NullCache;

impl WalletCache for NullCache {
    fn forget(&self, _wallet_id: WalletId) {}

    fn refresh(&self, _wallet: &Wallet) {}
}

/// Lock-free buffering sink.
///
/// Commit paths push concurrently; a downstream consumer drains in arrival
/// order. Also convenient in tests for asserting exactly which events a
/// sequence of operations emitted.
#[derive(Debug, Default)]
pub struct QueueSink {
    queue: SegQueue<WalletEvent>,
}

impl QueueSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops all buffered events in arrival order.
    pub fn drain(&self) -> Vec<WalletEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.queue.pop() {
            events.push(event);
        }
        events
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl EventSink for QueueSink {
    fn dispatch(&self, event: WalletEvent) {
        self.queue.push(event);
    }
}
