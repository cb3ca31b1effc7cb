use axum::response::Html;

const CONTROL_PAGE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        main { padding: 2rem 1.5rem; max-width: 800px; margin: 0 auto; box-sizing: border-box; }
        h1 { text-align: center; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); display: flex; flex-direction: column; gap: 1.25rem; }
        .form-group { display: flex; flex-direction: column; gap: 0.4rem; }
        label { font-weight: 600; color: #0f172a; }
        input[type="text"] { padding: 0.75rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; box-sizing: border-box; }
        input[type="text"]:focus { outline: none; border-color: #2563eb; box-shadow: 0 0 0 3px rgba(37, 99, 235, 0.12); }
        button { padding: 0.85rem 1.2rem; border: none; border-radius: 8px; background: #16a34a; color: #ffffff; font-weight: 600; cursor: pointer; transition: background 0.15s ease; }
        button:hover { background: #15803d; }
        button:disabled { background: #cbd5e1; cursor: not-allowed; }
        button#stopBtn { background: #dc2626; }
        button#stopBtn:hover { background: #b91c1c; }
        #filePath { word-break: break-all; font-size: 0.9rem; color: #475569; }
        .message { padding: 0.75rem 1rem; border-radius: 8px; }
        .message.success { background: #dcfce7; color: #166534; }
        .message.error { background: #fee2e2; color: #b91c1c; }
        .status-section { margin-top: 2rem; padding: 1.25rem; background: #f1f5f9; border-radius: 12px; }
        .status-title { font-size: 1.1rem; font-weight: 600; margin-bottom: 0.75rem; }
        .status-info { font-family: monospace; white-space: pre-wrap; word-break: break-all; background: #ffffff; padding: 0.75rem; border-radius: 8px; border: 1px solid #e2e8f0; }
        .no-publish { color: #64748b; font-style: italic; }
"#;

const CONTROL_PAGE_SCRIPT: &str = concat!(
    "<script>\n",
    include_str!("control_page.js"),
    "\n</script>",
);

/// `GET /`: the operator's publish/stop page.
pub async fn control_page() -> Html<String> {
    Html(render_control_page())
}

fn render_control_page() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>UEFI BIOS Update Server</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>{styles}</style>
</head>
<body>
    <main>
        <h1>UEFI BIOS Update Server</h1>
        <section class="panel">
            <div class="form-group">
                <label for="version">Version:</label>
                <input type="text" id="version" placeholder="Enter version (e.g., 1.0.0)" required>
            </div>
            <div class="form-group">
                <label for="fileInput">Select BIOS File:</label>
                <input type="file" id="fileInput" required>
                <div id="filePath"></div>
            </div>
            <button id="publishBtn" disabled>Publish</button>
            <button id="stopBtn">Stop Publishing</button>
            <div id="message"></div>
        </section>
        <section class="status-section">
            <div class="status-title">Current Published Status</div>
            <div id="currentStatus" class="status-info no-publish">No BIOS currently published</div>
        </section>
    </main>
    {script}
</body>
</html>"#,
        styles = CONTROL_PAGE_STYLES,
        script = CONTROL_PAGE_SCRIPT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_wires_form_to_endpoints() {
        let html = render_control_page();
        assert!(html.contains(r#"id="version""#));
        assert!(html.contains(r#"type="file""#));
        assert!(html.contains("fetch('/status')"));
        assert!(html.contains("'/publish'"));
        assert!(html.contains("'/stop'"));
    }
}
