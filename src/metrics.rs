use axum::http::{header, StatusCode};
use axum::{routing::get, Router};
use once_cell::sync::Lazy;
use prometheus::{opts, Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};

// 全局静态指标实例
pub static METRICS: Lazy<DohMetrics> = Lazy::new(DohMetrics::new);

// DoH 转发性能指标
pub struct DohMetrics {
    registry: Registry,

    // 1. 请求处理指标
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    aborted_requests_total: IntCounter,

    // 2. 上游 UDP 解析器指标
    upstream_errors_total: IntCounterVec,
    upstream_duration_seconds: Histogram,
}

impl Default for DohMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DohMetrics {
    // 创建新的指标收集器
    pub fn new() -> Self {
        let registry = Registry::new();

        // 1. 请求处理指标
        let requests_total = IntCounterVec::new(
            opts!(
                "dohstub_requests_total",
                "Total DoH requests answered, classified by HTTP status code"
            ),
            &["status"],
        )
        .unwrap();

        let request_duration_seconds = HistogramVec::new(
            prometheus::histogram_opts!(
                "dohstub_request_duration_seconds",
                "DoH request processing duration in seconds, classified by HTTP status code",
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
            ),
            &["status"],
        )
        .unwrap();

        let aborted_requests_total = IntCounter::new(
            "dohstub_aborted_requests_total",
            "Total DoH requests dropped without a response because the body could not be read",
        )
        .unwrap();

        // 2. 上游 UDP 解析器指标
        let upstream_errors_total = IntCounterVec::new(
            opts!(
                "dohstub_upstream_errors_total",
                "Total upstream UDP exchange failures, classified by error type"
            ),
            &["error_type"],
        )
        .unwrap();

        let upstream_duration_seconds = Histogram::with_opts(prometheus::histogram_opts!(
            "dohstub_upstream_duration_seconds",
            "Duration of successful upstream UDP exchanges in seconds",
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        ))
        .unwrap();

        let metrics = DohMetrics {
            registry,
            requests_total,
            request_duration_seconds,
            aborted_requests_total,
            upstream_errors_total,
            upstream_duration_seconds,
        };

        // 注册所有指标
        metrics.register_all_metrics();

        metrics
    }

    // 注册所有指标
    fn register_all_metrics(&self) {
        self.registry
            .register(Box::new(self.requests_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.request_duration_seconds.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.aborted_requests_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.upstream_errors_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.upstream_duration_seconds.clone()))
            .unwrap();
    }

    // 获取 Prometheus 注册表
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // 导出所有指标为文本格式
    pub fn export_metrics(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = String::new();
        if let Err(e) = encoder.encode_utf8(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        buffer
    }

    pub fn requests_total(&self) -> &IntCounterVec {
        &self.requests_total
    }

    pub fn request_duration_seconds(&self) -> &HistogramVec {
        &self.request_duration_seconds
    }

    pub fn aborted_requests_total(&self) -> &IntCounter {
        &self.aborted_requests_total
    }

    pub fn upstream_errors_total(&self) -> &IntCounterVec {
        &self.upstream_errors_total
    }

    pub fn upstream_duration_seconds(&self) -> &Histogram {
        &self.upstream_duration_seconds
    }
}

// 提供指标导出路由
pub fn metrics_routes() -> Router {
    Router::new().route(
        "/metrics",
        get(|| async {
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
                METRICS.export_metrics(),
            )
        }),
    )
}
