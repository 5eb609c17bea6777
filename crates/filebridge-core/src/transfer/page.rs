//! 手机端上传页面

use crate::config::Lang;

/// 页面文案
#[derive(Debug, Clone, Copy)]
pub struct PageTexts {
    pub page_title: &'static str,
    pub heading: &'static str,
    pub receiver: &'static str,
    pub select_files: &'static str,
    pub file_hint: &'static str,
    pub upload_btn: &'static str,
    pub uploading: &'static str,
    pub success_suffix: &'static str,
    pub upload_failed: &'static str,
    pub network_error: &'static str,
}

const JA: PageTexts = PageTexts {
    page_title: "File Bridge - アップロード",
    heading: "File Bridge",
    receiver: "送信先",
    select_files: "ファイルを選択",
    file_hint: "画像・動画・PDF など",
    upload_btn: "アップロード",
    uploading: "アップロード中... ",
    success_suffix: " 件のファイルをアップロードしました",
    upload_failed: "アップロードに失敗しました",
    network_error: "ネットワークエラーです。接続を確認してください。",
};

const EN: PageTexts = PageTexts {
    page_title: "File Bridge - Upload",
    heading: "File Bridge",
    receiver: "Sending to",
    select_files: "Select Files",
    file_hint: "Images, videos, PDFs, etc.",
    upload_btn: "Upload",
    uploading: "Uploading... ",
    success_suffix: " file(s) uploaded successfully!",
    upload_failed: "Upload failed",
    network_error: "Network error. Please check your connection.",
};

impl PageTexts {
    pub fn for_lang(lang: Lang) -> &'static PageTexts {
        match lang {
            Lang::Ja => &JA,
            Lang::En => &EN,
        }
    }
}

/// 渲染上传页面
pub fn render_upload_page(lang: Lang, host_name: &str) -> String {
    let t = PageTexts::for_lang(lang);
    PAGE_TEMPLATE
        .replace("{{lang}}", lang.code())
        .replace("{{page_title}}", t.page_title)
        .replace("{{heading}}", t.heading)
        .replace("{{receiver}}", t.receiver)
        .replace("{{host}}", &escape_html(host_name))
        .replace("{{select_files}}", t.select_files)
        .replace("{{file_hint}}", t.file_hint)
        .replace("{{upload_btn}}", t.upload_btn)
        .replace("{{uploading}}", t.uploading)
        .replace("{{success_suffix}}", t.success_suffix)
        .replace("{{upload_failed}}", t.upload_failed)
        .replace("{{network_error}}", t.network_error)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// 每个文件单独 POST 到 /api/upload，服务端只接受单文件请求
const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{lang}}">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no">
<title>{{page_title}}</title>
<style>
* { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #0f172a; color: #e2e8f0; min-height: 100vh; padding: 20px; }
.container { max-width: 480px; margin: 0 auto; }
h1 { font-size: 1.5rem; text-align: center; margin-bottom: 8px; color: #38bdf8; }
.receiver { text-align: center; color: #94a3b8; margin-bottom: 24px; font-size: 0.9rem; }
.upload-area { border: 2px dashed #475569; border-radius: 12px; padding: 32px 16px; text-align: center; margin-bottom: 16px; }
.file-input-label { display: inline-block; background: #2563eb; color: white; padding: 14px 28px; border-radius: 8px; font-size: 1.1rem; cursor: pointer; margin-bottom: 12px; }
input[type="file"] { display: none; }
.hint { color: #94a3b8; margin-top: 8px; font-size: 0.85rem; }
.file-item { background: #1e293b; padding: 10px 14px; border-radius: 8px; margin-bottom: 8px; display: flex; justify-content: space-between; font-size: 0.9rem; }
.file-item .name { flex: 1; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; margin-right: 8px; }
.file-item .size { color: #94a3b8; white-space: nowrap; }
.send-btn { display: block; width: 100%; padding: 16px; background: #16a34a; color: white; border: none; border-radius: 8px; font-size: 1.1rem; }
.send-btn:disabled { background: #334155; color: #64748b; }
.progress-bar { width: 100%; height: 6px; background: #334155; border-radius: 3px; margin: 16px 0; overflow: hidden; display: none; }
.progress-bar .fill { height: 100%; background: #38bdf8; width: 0%; }
.status { text-align: center; margin: 16px 0; min-height: 1.5em; }
.status.success { color: #4ade80; }
.status.error { color: #f87171; }
.status.uploading { color: #38bdf8; }
</style>
</head>
<body>
<div class="container">
  <h1>{{heading}}</h1>
  <p class="receiver">{{receiver}}: {{host}}</p>
  <div class="upload-area">
    <label class="file-input-label" for="fileInput">{{select_files}}</label>
    <input type="file" id="fileInput" multiple>
    <p class="hint">{{file_hint}}</p>
  </div>
  <div id="fileList"></div>
  <div class="progress-bar" id="progressBar"><div class="fill" id="progressFill"></div></div>
  <div class="status" id="status"></div>
  <button class="send-btn" id="sendBtn" disabled>{{upload_btn}}</button>
</div>
<script>
var T = {
  uploading: '{{uploading}}',
  successSuffix: '{{success_suffix}}',
  uploadFailed: '{{upload_failed}}',
  networkError: '{{network_error}}'
};
var fileInput = document.getElementById('fileInput');
var fileList = document.getElementById('fileList');
var sendBtn = document.getElementById('sendBtn');
var statusEl = document.getElementById('status');
var progressBar = document.getElementById('progressBar');
var progressFill = document.getElementById('progressFill');
var selected = [];

fileInput.addEventListener('change', function() {
  selected = Array.from(this.files);
  fileList.innerHTML = '';
  selected.forEach(function(f) {
    var div = document.createElement('div');
    div.className = 'file-item';
    var name = document.createElement('span');
    name.className = 'name';
    name.textContent = f.name;
    var size = document.createElement('span');
    size.className = 'size';
    size.textContent = formatSize(f.size);
    div.appendChild(name);
    div.appendChild(size);
    fileList.appendChild(div);
  });
  sendBtn.disabled = selected.length === 0;
  setStatus('', '');
});

function setStatus(text, cls) {
  statusEl.textContent = text;
  statusEl.className = 'status ' + cls;
}

function uploadOne(file, index, total) {
  return new Promise(function(resolve, reject) {
    var form = new FormData();
    form.append('file', file);
    var xhr = new XMLHttpRequest();
    xhr.open('POST', '/api/upload');
    xhr.upload.addEventListener('progress', function(e) {
      if (e.lengthComputable) {
        var pct = Math.round(((index + e.loaded / e.total) / total) * 100);
        progressFill.style.width = pct + '%';
        setStatus(T.uploading + pct + '%', 'uploading');
      }
    });
    xhr.addEventListener('load', function() {
      if (xhr.status === 200) { resolve(); return; }
      var msg = T.uploadFailed;
      try { msg = JSON.parse(xhr.responseText).error || msg; } catch (e) {}
      reject(msg);
    });
    xhr.addEventListener('error', function() { reject(T.networkError); });
    xhr.send(form);
  });
}

sendBtn.addEventListener('click', async function() {
  if (selected.length === 0) return;
  sendBtn.disabled = true;
  progressBar.style.display = 'block';
  progressFill.style.width = '0%';
  var done = 0;
  try {
    for (var i = 0; i < selected.length; i++) {
      await uploadOne(selected[i], i, selected.length);
      done++;
    }
    setStatus(done + T.successSuffix, 'success');
    selected = [];
    fileList.innerHTML = '';
  } catch (msg) {
    setStatus(msg, 'error');
    sendBtn.disabled = false;
  }
  progressBar.style.display = 'none';
});

function formatSize(bytes) {
  if (bytes < 1024) return bytes + ' B';
  if (bytes < 1024 * 1024) return (bytes / 1024).toFixed(1) + ' KB';
  if (bytes < 1024 * 1024 * 1024) return (bytes / (1024 * 1024)).toFixed(1) + ' MB';
  return (bytes / (1024 * 1024 * 1024)).toFixed(2) + ' GB';
}
</script>
</body>
</html>
"#;
