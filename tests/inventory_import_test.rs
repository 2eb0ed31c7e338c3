// ==========================================
// 库存/订单文件导入测试
// ==========================================
// 测试范围:
// 1. CSV 库存快照解析（表头别名、空行、零库存）
// 2. JSON 订单文件登记与订单列表
// 3. 文件数据驱动完整订单
// ==========================================


use std::io::Write;
use std::sync::Arc;
use tempfile::Builder;
use test_helpers::{drive_to_idle, fixture, local_config};
use tokio::time::Instant;
use warehouse_arm::importer::{ImportError, InventoryCsvParser};
use warehouse_arm::realtime::NoOpCommandSink;
use warehouse_arm::{ArmSimulation, InMemoryWarehouseApi, WarehouseApi};

fn fixture_api() -> Arc<InMemoryWarehouseApi> {
    let medicines = InventoryCsvParser
        .parse(&fixture("inventory.csv"))
        .expect("解析库存 CSV 失败");
    let api = InMemoryWarehouseApi::with_medicines(&medicines).expect("构建内存仓储服务失败");
    api.load_orders_json(fixture("orders.json"))
        .expect("加载订单文件失败");
    Arc::new(api)
}

#[test]
fn test_parse_inventory_fixture() {
    let medicines = InventoryCsvParser
        .parse(&fixture("inventory.csv"))
        .unwrap();

    assert_eq!(medicines.len(), 5);
    assert_eq!(medicines[0].id, "med-001");
    assert_eq!(medicines[0].container_label, "A1");
    assert_eq!(medicines[0].available_quantity, 2);
    assert_eq!(medicines[0].used_quantity, 8);
    assert!(medicines.iter().any(|m| m.name == "Cetirizine" && m.available_quantity == 0));
}

#[test]
fn test_parse_errors_carry_row_numbers() {
    let csv = "name,brand,container,available\nParacetamol,X,A1,two\n";
    let err = InventoryCsvParser.parse_reader(csv.as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        ImportError::TypeConversionError { row: 2, .. } | ImportError::FieldMissing { row: 2, .. }
    ));

    let missing = "name,brand,available\nParacetamol,X,1\n";
    assert!(matches!(
        InventoryCsvParser.parse_reader(missing.as_bytes()),
        Err(ImportError::FieldMissing { row: 2, .. })
    ));

    assert!(matches!(
        InventoryCsvParser.parse(std::path::Path::new("/no/such/inventory.csv")),
        Err(ImportError::FileNotFound(_))
    ));

    let mut xlsx = Builder::new().suffix(".xlsx").tempfile().unwrap();
    xlsx.write_all(b"not a spreadsheet").unwrap();
    assert!(matches!(
        InventoryCsvParser.parse(xlsx.path()),
        Err(ImportError::UnsupportedFormat(_))
    ));
}

#[tokio::test]
async fn test_order_listing_from_file() {
    let api = fixture_api();
    let orders = api.list_orders().await.unwrap();

    assert_eq!(orders.len(), 2);
    let alice = orders.iter().find(|o| o.order_id == "ORD-1001").unwrap();
    assert_eq!(alice.user_email.as_deref(), Some("alice@example.com"));
    assert_eq!(alice.items.len(), 2);
    assert!(alice.processed_at.is_none());

    let bob = orders.iter().find(|o| o.order_id == "ORD-1002").unwrap();
    assert_eq!(bob.user_email.as_deref(), Some("bob@example.com"));
}

#[tokio::test]
async fn test_file_backed_orders_run_to_completion() {
    let api = fixture_api();
    let mut sim = ArmSimulation::new(local_config(), api.clone(), Arc::new(NoOpCommandSink));

    let units = sim.load_inventory().await.unwrap();
    assert_eq!(units, 10);
    let labels: Vec<_> = sim.machine().inventory().labels().map(str::to_string).collect();
    assert_eq!(labels, vec!["A1", "A2", "B1", "B2"]);

    sim.submit_order("ORD-1002", Instant::now()).await.unwrap();
    drive_to_idle(&mut sim, Instant::now(), 200_000);

    let delivered = sim.machine().ledgers().delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].scan_code, "SCAN-77-1");
    assert_eq!(delivered[0].order_item_id, "item-77");
    assert_eq!(delivered[0].medicine_id, "med-003");

    sim.submit_order("ORD-1001", Instant::now()).await.unwrap();
    drive_to_idle(&mut sim, Instant::now(), 200_000);
    assert_eq!(sim.machine().ledgers().delivered().len(), 4);
    assert_eq!(sim.machine().inventory().quantity_of("Paracetamol", "W"), 4);

    let processed = api.list_orders().await.unwrap();
    assert!(processed.iter().all(|o| o.processed_at.is_some()));
}
