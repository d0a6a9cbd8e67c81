use ampdefend_core::io_adapters::{relay_router, RelayState};
use ampdefend_core::pipeline::IngestPipeline;
use axum::extract::{Path, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

/// Dashboard read API plus the user alert operations, with the webhook
/// relay mounted same-origin.
pub fn dashboard_router(pipeline: Arc<IngestPipeline>, relay: RelayState) -> Router {
    Router::new()
        .route("/", get(serve_html))
        .route("/api/alerts", get(api_alerts))
        .route("/api/alerts/read-all", post(api_mark_all_read))
        .route("/api/alerts/clear", post(api_clear_all))
        .route("/api/alerts/:id/read", post(api_mark_read))
        .route("/api/alerts/:id/dismiss", post(api_dismiss))
        .route("/api/threats", get(api_threats))
        .route("/api/metrics", get(api_metrics))
        .route("/api/status", get(api_status))
        .with_state(pipeline)
        .merge(relay_router(relay))
}

pub async fn start_dashboard(
    pipeline: Arc<IngestPipeline>,
    relay: RelayState,
    bind: &str,
) -> anyhow::Result<()> {
    let app = dashboard_router(pipeline, relay);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_html() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn api_alerts(State(pipeline): State<Arc<IngestPipeline>>) -> Json<serde_json::Value> {
    let alerts = pipeline.alerts();
    Json(json!({
        "alerts": alerts,
        "total": alerts.len(),
        "unread": pipeline.unread_count(),
    }))
}

async fn api_mark_read(
    State(pipeline): State<Arc<IngestPipeline>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    pipeline.mark_as_read(&id);
    Json(json!({ "success": true }))
}

async fn api_mark_all_read(State(pipeline): State<Arc<IngestPipeline>>) -> Json<serde_json::Value> {
    pipeline.mark_all_as_read();
    Json(json!({ "success": true }))
}

async fn api_dismiss(
    State(pipeline): State<Arc<IngestPipeline>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    pipeline.dismiss_alert(&id);
    Json(json!({ "success": true }))
}

async fn api_clear_all(State(pipeline): State<Arc<IngestPipeline>>) -> Json<serde_json::Value> {
    pipeline.clear_all();
    Json(json!({ "success": true }))
}

async fn api_threats(State(pipeline): State<Arc<IngestPipeline>>) -> Json<serde_json::Value> {
    let threats: Vec<serde_json::Value> = pipeline
        .threats()
        .into_iter()
        .map(|(id, record)| {
            let mut value = serde_json::to_value(&record).unwrap_or_else(|_| json!({}));
            if let Some(obj) = value.as_object_mut() {
                obj.insert("id".into(), json!(id));
            }
            value
        })
        .collect();
    Json(json!({ "threats": threats, "total": threats.len() }))
}

async fn api_metrics(State(pipeline): State<Arc<IngestPipeline>>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(pipeline.metrics()).unwrap_or_else(|_| json!({})))
}

async fn api_status(State(pipeline): State<Arc<IngestPipeline>>) -> Json<serde_json::Value> {
    let status = pipeline.status();
    Json(json!({
        "loading": status.loading,
        "error": status.error,
        "snapshots_processed": pipeline.snapshots_processed(),
        "webhook_attempts": pipeline.sender().attempts(),
        "webhook_failed": pipeline.sender().failed(),
    }))
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>AMPDefend — Threat Monitoring</title>
<style>
*{margin:0;padding:0;box-sizing:border-box}
:root{--bg:#0a0e17;--card:#111827;--border:#1e293b;--text:#e2e8f0;--dim:#64748b;
--green:#10b981;--red:#ef4444;--amber:#f59e0b;--cyan:#06b6d4}
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,monospace;background:var(--bg);color:var(--text);min-height:100vh}
header{border-bottom:1px solid var(--border);padding:16px 24px;display:flex;justify-content:space-between;align-items:center}
header h1{font-size:20px;color:var(--cyan)}
header .meta{font-size:12px;color:var(--dim)}
.stats-bar{display:flex;gap:16px;padding:16px 24px;border-bottom:1px solid var(--border)}
.stat{background:var(--card);border:1px solid var(--border);border-radius:8px;padding:12px 20px;flex:1;text-align:center}
.stat .val{font-size:28px;font-weight:700;color:var(--cyan)}
.stat.critical .val{color:var(--red)}
.stat .label{font-size:11px;color:var(--dim);text-transform:uppercase;letter-spacing:1px;margin-top:4px}
main{padding:16px 24px}
.panel{background:var(--card);border:1px solid var(--border);border-radius:8px;overflow:hidden}
.panel-header{padding:12px 16px;border-bottom:1px solid var(--border);font-size:13px;color:var(--dim);display:flex;justify-content:space-between}
.panel-header button{background:none;border:1px solid var(--border);color:var(--dim);border-radius:4px;padding:2px 8px;cursor:pointer;font-size:11px}
.panel-body{padding:12px 16px;max-height:500px;overflow-y:auto}
.alert-item{padding:8px 0;border-bottom:1px solid #1a1f2e;font-size:12px;display:flex;gap:10px}
.alert-item.unread .title{color:var(--cyan)}
.alert-sev{font-size:10px;font-weight:700;padding:2px 6px;border-radius:3px;min-width:60px;text-align:center;flex-shrink:0}
.sev-critical{background:rgba(239,68,68,0.2);color:var(--red)}
.sev-high{background:rgba(245,158,11,0.2);color:var(--amber)}
.sev-medium{background:rgba(6,182,212,0.2);color:var(--cyan)}
.sev-low{background:rgba(100,116,139,0.2);color:var(--dim)}
.alert-body .title{font-weight:600}
.alert-body .msg{color:var(--dim);margin-top:2px}
.no-data{color:var(--dim);font-size:13px;text-align:center;padding:20px}
.feed-error{color:var(--red);font-size:12px;padding:8px 24px}
</style>
</head>
<body>
<header>
<div><h1>AMPDEFEND</h1><div class="meta">Honeypot Threat Monitoring</div></div>
<div class="meta" id="updated"></div>
</header>
<div class="feed-error" id="feed-error" hidden></div>
<div class="stats-bar">
<div class="stat" id="stat-honeypots"><div class="val">-</div><div class="label">Active Honeypots</div></div>
<div class="stat critical" id="stat-threats"><div class="val">0</div><div class="label">Threats Detected</div></div>
<div class="stat" id="stat-blocked"><div class="val">0</div><div class="label">Blocked IPs</div></div>
<div class="stat" id="stat-unread"><div class="val">0</div><div class="label">Unread Alerts</div></div>
</div>
<main>
<div class="panel">
<div class="panel-header"><span>Alert Feed</span>
<span><button onclick="op('read-all')">Mark all read</button>
<button onclick="op('clear')">Clear</button></span></div>
<div class="panel-body" id="alert-feed"><div class="no-data">Loading alerts...</div></div>
</div>
</main>
<script>
async function op(path){await fetch('/api/alerts/'+path,{method:'POST'});refresh()}
async function refresh(){
  try{
    const[alerts,metrics,status]=await Promise.all([
      fetch('/api/alerts').then(r=>r.json()),
      fetch('/api/metrics').then(r=>r.json()),
      fetch('/api/status').then(r=>r.json())
    ]);
    document.querySelector('#stat-honeypots .val').textContent=metrics.active_honeypots;
    document.querySelector('#stat-threats .val').textContent=metrics.threats_detected;
    document.querySelector('#stat-blocked .val').textContent=metrics.blocked_ips;
    document.querySelector('#stat-unread .val').textContent=alerts.unread;
    document.getElementById('updated').textContent='Updated '+new Date(metrics.last_updated).toLocaleTimeString();
    const err=document.getElementById('feed-error');
    err.hidden=!status.error;err.textContent=status.error||'';
    const feed=document.getElementById('alert-feed');
    if(alerts.alerts.length===0){feed.innerHTML='<div class="no-data">No alerts</div>';}
    else{feed.innerHTML=alerts.alerts.map(a=>`
      <div class="alert-item ${a.read?'':'unread'}">
        <div class="alert-sev sev-${a.severity}">${a.severity.toUpperCase()}</div>
        <div class="alert-body">
          <div class="title">${a.title}</div>
          <div class="msg">${a.message}</div>
        </div>
      </div>`).join('');}
  }catch(e){console.error('Refresh error',e)}
}
setInterval(refresh,5000);refresh();
</script>
</body>
</html>"#;
