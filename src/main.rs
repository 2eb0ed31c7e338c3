// ==========================================
// 药品仓储机械臂拣选仿真 - 命令行入口
// ==========================================
// 用法:
//   warehouse-arm [inventory.csv] [orders.json] [order_id ...]
//
// 未给出库存文件时使用内置演示数据；未给出订单号时处理全部未处理订单。
// 配置文件: 环境变量 WAREHOUSE_ARM_CONFIG，或默认配置目录下的 config.json
// ==========================================

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use warehouse_arm::api::OrderItemSpec;
use warehouse_arm::config::get_default_config_path;
use warehouse_arm::importer::InventoryCsvParser;
use warehouse_arm::realtime::LoopbackHandle;
use warehouse_arm::{
    logging, ArmSimulation, CommandSink, ConfigManager, InMemoryWarehouseApi, LoopbackRobot,
    Medicine, NoOpCommandSink, SimulationConfig, WarehouseApi,
};

const CONFIG_ENV: &str = "WAREHOUSE_ARM_CONFIG";
const LOOPBACK_LATENCY: Duration = Duration::from_millis(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", warehouse_arm::APP_NAME);
    tracing::info!("系统版本: {}", warehouse_arm::VERSION);
    tracing::info!("==================================================");

    let mut args = std::env::args().skip(1);
    let inventory_path = args.next().map(PathBuf::from);
    let orders_path = args.next().map(PathBuf::from);
    let mut order_ids: Vec<String> = args
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let config = load_config()?;

    // 仓储服务（内存实现）
    let api = match &inventory_path {
        Some(path) => {
            let medicines = InventoryCsvParser.parse(path)?;
            InMemoryWarehouseApi::with_medicines(&medicines)?
        }
        None => demo_api()?,
    };
    if let Some(path) = &orders_path {
        api.load_orders_json(path)?;
    }
    let api = Arc::new(api);

    let (medicines, orders) = futures::try_join!(api.fetch_medicines(), api.list_orders())?;
    tracing::info!(medicines = medicines.len(), orders = orders.len(), "仓储服务就绪");

    if order_ids.is_empty() {
        order_ids = orders
            .iter()
            .filter(|o| o.processed_at.is_none())
            .map(|o| o.order_id.clone())
            .collect();
    }

    // 实时通道：同步模式下使用回环机器人
    let (sink, mut events, loopback): (Arc<dyn CommandSink>, _, Option<LoopbackHandle>) =
        if config.sync_enabled {
            let (sink, events, handle) = LoopbackRobot::spawn(LOOPBACK_LATENCY);
            (Arc::new(sink) as Arc<dyn CommandSink>, Some(events), Some(handle))
        } else {
            (Arc::new(NoOpCommandSink) as Arc<dyn CommandSink>, None, None)
        };

    let mut sim = ArmSimulation::new(config, api, sink);
    sim.load_inventory().await?;

    for order_id in &order_ids {
        if let Err(e) = sim.submit_order(order_id, tokio::time::Instant::now()).await {
            tracing::warn!(order_id = %order_id, error = %e, "订单未能开始处理");
            continue;
        }
        let frames = sim.run_until_idle(events.as_mut()).await?;
        tracing::info!(order_id = %order_id, frames, status = %sim.status(), "订单运行结束");
    }

    println!("{}", serde_json::to_string_pretty(&sim.snapshot())?);

    if let Some(handle) = loopback {
        handle.shutdown();
    }
    Ok(())
}

/// 加载配置：环境变量指定路径 → 默认路径（存在时）→ 内置默认值
fn load_config() -> anyhow::Result<SimulationConfig> {
    let explicit = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
    let manager = match explicit {
        Some(path) => read_config(&path)?,
        None => {
            let path = get_default_config_path();
            if path.exists() {
                read_config(&path)?
            } else {
                ConfigManager::in_memory()
            }
        }
    };

    let config = SimulationConfig::from_manager(&manager)?;
    tracing::debug!(
        sync = config.sync_enabled,
        ack_policy = ?config.ack_policy,
        blend = config.tuning.blend_factor,
        "仿真配置已加载"
    );
    Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<ConfigManager> {
    ConfigManager::new(path).with_context(|| format!("加载配置文件失败: {}", path.display()))
}

/// 内置演示数据
fn demo_api() -> anyhow::Result<InMemoryWarehouseApi> {
    let medicine = |id: &str, name: &str, brand: &str, label: &str, qty: u32| Medicine {
        id: id.to_string(),
        name: name.to_string(),
        brand: brand.to_string(),
        container_label: label.to_string(),
        total_units: qty,
        available_quantity: qty,
        used_quantity: 0,
    };

    let api = InMemoryWarehouseApi::with_medicines(&[
        medicine("demo-1", "Paracetamol", "X", "A1", 2),
        medicine("demo-2", "Ibuprofen", "Y", "A2", 3),
        medicine("demo-3", "Amoxicillin", "Z", "B1", 1),
    ])?;
    api.add_order(
        "DEMO-1",
        Some("demo@example.com"),
        &[
            OrderItemSpec::new("Paracetamol", "X", "A1", 2),
            OrderItemSpec::new("Ibuprofen", "Q", "A2", 1),
            OrderItemSpec::new("Aspirin", "X", "B1", 1),
        ],
    )?;
    Ok(api)
}
