//! Handler tests
//!
//! Run against the in-memory store with audit disabled.

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;

    use crate::audit::AuditNotifier;
    use crate::domain::{
        AccountId, AccountStatus, Actor, Balance, ClientId, HistoryFilter, LedgerError, NewAccount,
        NewClient, OperationContext, Role, ValidationError,
    };
    use crate::error::AppError;
    use crate::handlers::{
        AccountHandler, HistoryHandler, OpenAccountPayload, TransactionHandler, TransactionPayload,
        TransferHandler, TransferPayload,
    };
    use crate::ledger::{AccountGuard, AccountLocks, LedgerEngine};
    use crate::store::MemoryStore;

    struct Handlers {
        store: Arc<MemoryStore>,
        guard: Arc<AccountGuard<MemoryStore>>,
        transactions: TransactionHandler<MemoryStore>,
        transfers: TransferHandler<MemoryStore>,
        history: HistoryHandler<MemoryStore>,
        accounts: AccountHandler<MemoryStore>,
        client_id: ClientId,
    }

    fn handlers() -> Handlers {
        let store = Arc::new(MemoryStore::new());
        let locks = Arc::new(AccountLocks::new());
        let engine = Arc::new(LedgerEngine::with_locks(
            Arc::clone(&store),
            Arc::clone(&locks),
            AuditNotifier::disabled(),
        ));
        let guard = Arc::new(AccountGuard::new(
            Arc::clone(&store),
            locks,
            AuditNotifier::disabled(),
        ));
        let client_id = store
            .insert_client(NewClient {
                last_name: "Rakoto".into(),
                first_name: "Vola".into(),
                ..NewClient::default()
            })
            .id;

        Handlers {
            transactions: TransactionHandler::new(Arc::clone(&engine)),
            transfers: TransferHandler::new(Arc::clone(&engine)),
            history: HistoryHandler::new(Arc::clone(&engine)),
            accounts: AccountHandler::new(engine, Arc::clone(&guard)),
            store,
            guard,
            client_id,
        }
    }

    impl Handlers {
        async fn active_account(&self, balance: rust_decimal::Decimal) -> AccountId {
            let account = self
                .guard
                .open(
                    NewAccount {
                        client_id: self.client_id,
                        name: "Courant".into(),
                        description: None,
                        opening_balance: Balance::new(balance).unwrap(),
                    },
                    &as_role(Role::Admin),
                )
                .await
                .unwrap();
            self.guard.activate(account.id(), &as_role(Role::Admin)).await.unwrap();
            account.id()
        }
    }

    fn as_role(role: Role) -> OperationContext {
        OperationContext::new().with_actor(Actor::new(42, role))
    }

    fn deposit(account_id: AccountId, amount: &str) -> TransactionPayload {
        serde_json::from_value(json!({
            "nom": "Versement",
            "description": "Guichet",
            "date": "2024-06-01",
            "type": "DEPOT",
            "compte_id": account_id,
            "montant": amount
        }))
        .unwrap()
    }

    // =========================================================================
    // Roles
    // =========================================================================

    #[tokio::test]
    async fn test_anonymous_request_rejected() {
        let h = handlers();
        let err = h
            .transactions
            .execute(&deposit(1, "10"), &OperationContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingHeader(_)));
    }

    #[tokio::test]
    async fn test_client_role_cannot_post_transactions() {
        let h = handlers();
        let id = h.active_account(dec!(0)).await;

        let err = h
            .transactions
            .execute(&deposit(id, "10"), &as_role(Role::Client))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_client_role_may_transfer() {
        let h = handlers();
        let a = h.active_account(dec!(100)).await;
        let b = h.active_account(dec!(0)).await;
        let payload: TransferPayload =
            serde_json::from_value(json!({ "compte_id": a, "compte_id_destinataire": b, "montant_transfert": 40 }))
                .unwrap();

        let receipt = h.transfers.execute(&payload, &as_role(Role::Client)).await.unwrap();

        assert_eq!(receipt.source_balance.value(), dec!(60));
        assert_eq!(receipt.destination_balance.value(), dec!(40));
    }

    #[tokio::test]
    async fn test_only_admin_activates_and_deletes() {
        let h = handlers();
        let payload: OpenAccountPayload =
            serde_json::from_value(json!({ "client_id": h.client_id, "nom_compte": "Epargne" })).unwrap();
        let account = h.accounts.open(&payload, &as_role(Role::Caissier)).await.unwrap();
        assert_eq!(account.status(), AccountStatus::Inactive);

        let err = h
            .accounts
            .activate(account.id(), &as_role(Role::Caissier))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let active = h.accounts.activate(account.id(), &as_role(Role::Admin)).await.unwrap();
        assert_eq!(active.status(), AccountStatus::Active);

        h.accounts.soft_delete(account.id(), &as_role(Role::Admin)).await.unwrap();
        let err = h.accounts.get(account.id(), &as_role(Role::Client)).await.unwrap_err();
        assert!(matches!(err, AppError::Ledger(LedgerError::AccountNotFound { .. })));
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    #[tokio::test]
    async fn test_transaction_rejections_are_wrapped() {
        let h = handlers();

        let err = h
            .transactions
            .execute(&deposit(999, "10"), &as_role(Role::Caissier))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::TransactionRejected(LedgerError::AccountNotFound { account_id: 999, .. })
        ));

        let err = h
            .transactions
            .execute(&deposit(1, "1.001"), &as_role(Role::Caissier))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::TransactionRejected(LedgerError::Validation(ValidationError::TooPrecise(_)))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_admin() {
        let h = handlers();
        let id = h.active_account(dec!(0)).await;
        let tx = h
            .transactions
            .execute(&deposit(id, "10"), &as_role(Role::Caissier))
            .await
            .unwrap();

        let err = h.transactions.delete(tx.id, &as_role(Role::Caissier)).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        h.transactions.delete(tx.id, &as_role(Role::Admin)).await.unwrap();
        assert_eq!(h.store.transaction_count(), 0);
    }

    // =========================================================================
    // History
    // =========================================================================

    #[tokio::test]
    async fn test_history_scopes() {
        let h = handlers();
        let id = h.active_account(dec!(0)).await;
        let teller = as_role(Role::Caissier);
        let tx = h.transactions.execute(&deposit(id, "10"), &teller).await.unwrap();

        let rows = h.history.list(HistoryFilter::for_account(id), &teller).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction_id, tx.id);

        let june = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let rows = h
            .history
            .list(HistoryFilter::for_client(h.client_id).since(june), &teller)
            .await
            .unwrap();
        assert!(rows.is_empty());

        let row = h.history.find(tx.id, &teller).await.unwrap();
        assert_eq!(row.balance_after.value(), dec!(10));

        let err = h.history.list(HistoryFilter::for_client(77), &teller).await.unwrap_err();
        assert!(matches!(err, AppError::Ledger(LedgerError::ClientNotFound(77))));

        let err = h.history.find(tx.id + 1, &teller).await.unwrap_err();
        assert!(matches!(err, AppError::Ledger(LedgerError::TransactionNotFound(_))));
    }

    #[tokio::test]
    async fn test_verification_report() {
        let h = handlers();
        let id = h.active_account(dec!(5)).await;
        let teller = as_role(Role::Admin);
        h.transactions.execute(&deposit(id, "10"), &teller).await.unwrap();

        let report = h.history.verify(id, &teller).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.opening_balance, Some(dec!(5)));
        assert_eq!(report.account_balance, dec!(15));
    }
}
