//! 路由指标收集模块
//!
//! 记录每条观测的路由结果、元数据刷新、告警与分发情况，
//! 并提供内存聚合器用于运行结束时输出摘要。

use metrics::{counter, gauge, histogram};
use std::collections::BTreeMap;

/// 记录一条观测的路由结果
///
/// `class`: clean / unknown_sensor / still_invalid / resolved / dropped
pub fn record_observation_routed(class: &str) {
    counter!(
        "stream_mapper_observations_total",
        "class" => class.to_string()
    )
    .increment(1);
}

/// 记录单条观测的路由耗时
pub fn record_route_latency_ms(latency_ms: f64) {
    histogram!("stream_mapper_route_latency_ms").record(latency_ms);
}

/// 记录一次真实的元数据刷新 (合并的等待者不计入)
pub fn record_metadata_refresh(success: bool, elapsed_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "stream_mapper_metadata_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("stream_mapper_metadata_refresh_ms").record(elapsed_ms);
    if success {
        gauge!("stream_mapper_metadata_last_refresh_ms").set(elapsed_ms);
    }
}

/// 记录进入 misfit 表的键数量
pub fn record_misfit_keys(count: usize) {
    if count > 0 {
        counter!("stream_mapper_misfit_keys_total").increment(count as u64);
    }
}

/// 记录已发送的告警
///
/// `kind`: raise / resolve
pub fn record_alert(kind: &str) {
    counter!(
        "stream_mapper_alerts_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// 记录一次输出分发
pub fn record_dispatch(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "stream_mapper_dispatch_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录因队列已满而丢弃的条目
pub fn record_queue_dropped(sink_name: &str) {
    counter!(
        "stream_mapper_queue_dropped_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 记录无法解码的输入记录
pub fn record_record_malformed() {
    counter!("stream_mapper_records_malformed_total").increment(1);
}

/// 路由指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RoutingMetricsAggregator {
    /// 总观测数
    pub total_observations: u64,

    /// 各路由结果计数
    pub class_counts: BTreeMap<String, u64>,

    /// 含 misfit 键的观测数
    pub observations_with_misfits: u64,

    /// misfit 键总数
    pub total_misfit_keys: u64,

    /// 写入的特征行总数
    pub total_feature_rows: u64,

    /// 路由耗时统计 (毫秒)
    pub latency_stats: RunningStats,
}

impl RoutingMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, class: &str, feature_rows: usize, misfit_keys: usize, latency_ms: f64) {
        self.total_observations += 1;
        *self.class_counts.entry(class.to_string()).or_insert(0) += 1;

        if misfit_keys > 0 {
            self.observations_with_misfits += 1;
            self.total_misfit_keys += misfit_keys as u64;
        }
        self.total_feature_rows += feature_rows as u64;
        self.latency_stats.push(latency_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> RoutingSummary {
        RoutingSummary {
            total_observations: self.total_observations,
            class_counts: self.class_counts.clone(),
            observations_with_misfits: self.observations_with_misfits,
            total_misfit_keys: self.total_misfit_keys,
            total_feature_rows: self.total_feature_rows,
            misfit_rate: if self.total_observations > 0 {
                self.observations_with_misfits as f64 / self.total_observations as f64 * 100.0
            } else {
                0.0
            },
            route_latency_ms: StatsSummary::from(&self.latency_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct RoutingSummary {
    pub total_observations: u64,
    pub class_counts: BTreeMap<String, u64>,
    pub observations_with_misfits: u64,
    pub total_misfit_keys: u64,
    pub total_feature_rows: u64,
    pub misfit_rate: f64,
    pub route_latency_ms: StatsSummary,
}

impl std::fmt::Display for RoutingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Routing Metrics Summary ===")?;
        writeln!(f, "Total observations: {}", self.total_observations)?;
        writeln!(f, "Feature rows: {}", self.total_feature_rows)?;
        writeln!(
            f,
            "Observations with misfits: {} ({:.2}%)",
            self.observations_with_misfits, self.misfit_rate
        )?;
        writeln!(f, "Misfit keys: {}", self.total_misfit_keys)?;
        writeln!(f, "Route latency (ms): {}", self.route_latency_ms)?;

        if !self.class_counts.is_empty() {
            writeln!(f, "Outcomes:")?;
            for (class, count) in &self.class_counts {
                writeln!(f, "  {}: {}", class, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
