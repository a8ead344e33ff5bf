//! Embedded static assets.
//!
//! Page rendering is an external concern; the core only serves these bytes.
//! The page is deliberately self-contained (no external fetches besides the
//! device's own API) and talks to the JSON endpoints with the CSRF token
//! returned by login.

/// The control page served at `GET /`.
pub const CONTROL_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Relay Control</title>
<style>
body{font-family:sans-serif;background:#222;color:#eee;display:flex;justify-content:center;padding:2em}
.card{background:#333;border-radius:12px;padding:2em;max-width:22em;width:100%}
h1{font-size:1.4em;margin-top:0}
.state{padding:.6em;border-radius:8px;text-align:center;font-weight:bold;margin-bottom:1em}
.on{background:#1d4d1d}.off{background:#4d1d1d}
button{width:100%;padding:.8em;border:0;border-radius:8px;font-size:1em;cursor:pointer}
dl{display:grid;grid-template-columns:auto auto;gap:.3em .8em;font-size:.9em}
dd{margin:0;text-align:right}
</style>
</head>
<body>
<div class="card">
<h1>Relay Control</h1>
<div id="state" class="state off">&mdash;</div>
<button id="toggle">Toggle</button>
<dl>
<dt>Session on</dt><dd id="session">&mdash;</dd>
<dt>Total on time</dt><dd id="total">&mdash;</dd>
<dt>Cycles</dt><dd id="cycles">&mdash;</dd>
</dl>
</div>
<script>
let csrf = sessionStorage.getItem('csrf') || '';
async function refresh(){
  const r = await fetch('/api/status');
  if(!r.ok) return;
  const s = await r.json();
  const el = document.getElementById('state');
  el.textContent = s.state ? 'ON' : 'OFF';
  el.className = 'state ' + (s.state ? 'on' : 'off');
  document.getElementById('session').textContent = s.session_on_duration + 's';
  document.getElementById('total').textContent = s.cumulative_on_time + 's';
  document.getElementById('cycles').textContent = s.cycle_count;
}
document.getElementById('toggle').addEventListener('click', async () => {
  const r = await fetch('/api/relay/toggle', {method:'POST', headers:{'X-CSRF-Token':csrf}});
  if(r.ok){ const b = await r.json(); if(b.csrf_token){ csrf = b.csrf_token; sessionStorage.setItem('csrf', csrf); } }
  refresh();
});
refresh();
setInterval(refresh, 5000);
</script>
</body>
</html>
"#;
