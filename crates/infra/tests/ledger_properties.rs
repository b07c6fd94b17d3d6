use proptest::prelude::*;
use rust_decimal::Decimal;

use stockbook_core::OwnerId;
use stockbook_infra::{InMemoryInventoryService, InventoryError, MovementRequest};
use stockbook_inventory::{ItemChanges, NewStockCategory, NewStockItem, ledger_balance};

#[derive(Debug, Clone)]
enum Op {
    In(i64),
    Out(i64),
    Set(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..50).prop_map(Op::In),
        (1i64..80).prop_map(Op::Out),
        (0i64..60).prop_map(Op::Set),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    /// Property: whatever the mix of accepted and rejected operations, the
    /// cached quantity equals the ledger sum and never goes negative.
    #[test]
    fn service_keeps_quantity_equal_to_ledger(
        initial in 0i64..40,
        ops in prop::collection::vec(op(), 1..40)
    ) {
        let service = InMemoryInventoryService::in_memory();
        let owner = OwnerId::new();
        let category = service
            .add_category(NewStockCategory {
                owner_id: owner,
                name: "Props".into(),
                description: None,
            })
            .unwrap();
        let item = service
            .add_item(NewStockItem {
                owner_id: owner,
                category_id: category.id(),
                name: "Thing".into(),
                initial_quantity: initial,
                unit_price: Decimal::ONE,
                currency: "USD".into(),
                low_stock_threshold: Some(10),
            })
            .unwrap();
        let id = item.id_typed();
        let mut expected = initial;

        for op in ops {
            let before = service.item_history(id).unwrap().len();
            let result = match op {
                Op::In(q) => service.record_stock_in(id, MovementRequest::of(q)),
                Op::Out(q) => service.record_stock_out(id, MovementRequest::of(q)),
                Op::Set(q) => service.edit_item(id, ItemChanges {
                    quantity: Some(q),
                    ..ItemChanges::default()
                }),
            };

            match (&op, result) {
                (Op::Out(q), Err(InventoryError::InsufficientStock { requested, available })) => {
                    prop_assert_eq!(requested, *q);
                    prop_assert_eq!(available, expected);
                    prop_assert!(*q > expected);
                    prop_assert_eq!(service.item_history(id).unwrap().len(), before);
                }
                (_, Err(err)) => prop_assert!(false, "unexpected error: {err}"),
                (Op::In(q), Ok(updated)) => {
                    expected += q;
                    prop_assert_eq!(updated.quantity(), expected);
                }
                (Op::Out(q), Ok(updated)) => {
                    expected -= q;
                    prop_assert_eq!(updated.quantity(), expected);
                }
                (Op::Set(q), Ok(updated)) => {
                    let appended = usize::from(*q != expected);
                    expected = *q;
                    prop_assert_eq!(updated.quantity(), expected);
                    prop_assert_eq!(service.item_history(id).unwrap().len(), before + appended);
                }
            }

            let history = service.item_history(id).unwrap();
            prop_assert!(expected >= 0);
            prop_assert_eq!(ledger_balance(&history), expected);
        }

        prop_assert!(service.verify_ledger().unwrap().is_empty());
    }
}
