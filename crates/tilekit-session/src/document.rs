use crate::binding::ComponentDescriptor;

/// Render the self-contained document injected into a fresh runtime.
///
/// The document carries the external contract of a session: the
/// import-resolution table, stylesheet links, the error and rejection
/// reporting channel, the loaded signal, the pending-promise table for
/// non-blocking call completions, and the update entry point the host
/// re-invokes with newly encoded properties. The runtime glue is expected
/// to expose `globalThis.__tilekitHost` with `error`, `loaded`, and
/// `call` channels before evaluation starts.
pub fn render_document(descriptor: &ComponentDescriptor, props_js: &str) -> String {
    let css_links = descriptor
        .styles
        .iter()
        .map(|path| format!("\t<link rel=\"stylesheet\" href=\"{path}\">"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut imports = serde_json::Map::new();
    for (specifier, url) in &descriptor.import_map {
        imports.insert(
            specifier.clone(),
            serde_json::Value::String(url.clone()),
        );
    }
    let import_map_json =
        serde_json::to_string(&serde_json::json!({ "imports": imports }))
            .expect("import map serializes");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
{css_links}
	<script type="importmap">
	{import_map_json}
	</script>
	<script>
		globalThis.__tilekit = {{
			seq: 0,
			pending: new Map(),
			update: null,
			nextToken() {{ return 't' + (this.seq++); }},
			post(message) {{ globalThis.__tilekitHost.call(message); }},
			completeCall(token, payload) {{
				const entry = this.pending.get(token);
				if (!entry) return;
				this.pending.delete(token);
				entry.resolve(payload === null ? undefined : payload);
			}},
			failCall(token, message) {{
				const entry = this.pending.get(token);
				if (!entry) return;
				this.pending.delete(token);
				entry.reject(new Error(message));
			}}
		}};

		// Send script errors to the host
		window.onerror = function(message, source, lineno, colno, error) {{
			globalThis.__tilekitHost.error({{
				message: String(message),
				source: String(source || 'unknown'),
				line: lineno || 0,
				column: colno || 0,
				stack: error && error.stack ? String(error.stack) : null
			}});
			return false;
		}};

		// Send unhandled promise rejections to the host
		window.onunhandledrejection = function(event) {{
			globalThis.__tilekitHost.error({{
				message: 'Unhandled Promise Rejection: ' + String(event.reason),
				source: 'promise',
				line: 0,
				column: 0,
				stack: event.reason && event.reason.stack ? String(event.reason.stack) : null
			}});
		}};
	</script>
</head>
<body>
	<div id="root"></div>
	<script type="module">
		try {{
			const {{ jsx }} = await import("react/jsx-runtime");
			const {{ createRoot }} = await import("react-dom/client");
			const Tile = (await import("{entry}")).default;
			const root = createRoot(document.getElementById("root"));
			globalThis.__tilekit.update = (props) => root.render(jsx(Tile, props));
			globalThis.__tilekit.update({props_js});
		}} catch (error) {{
			window.reportError(error);
		}} finally {{
			globalThis.__tilekitHost.loaded({{}});
		}}
	</script>
</body>
</html>
"#,
        entry = descriptor.entry,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ComponentDescriptor;

    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor {
            entry: "./Counter/index.js".into(),
            styles: vec!["./Counter/style.css".into()],
            import_map: vec![(
                "react".into(),
                "https://esm.sh/react@19".into(),
            )],
            precache: vec![],
        }
    }

    #[test]
    fn document_embeds_the_session_contract() {
        let html = render_document(&descriptor(), r#"{"count":42}"#);

        // Import-resolution table and stylesheet links.
        assert!(html.contains(r#"<script type="importmap">"#));
        assert!(html.contains(r#"{"imports":{"react":"https://esm.sh/react@19"}}"#));
        assert!(html.contains(r#"<link rel="stylesheet" href="./Counter/style.css">"#));

        // Error, rejection, and loaded channels.
        assert!(html.contains("window.onerror"));
        assert!(html.contains("window.onunhandledrejection"));
        assert!(html.contains("__tilekitHost.loaded"));

        // Update entry point, invoked once with the encoded properties.
        assert!(html.contains(r#"globalThis.__tilekit.update({"count":42});"#));

        // Pending-promise table for non-blocking completions.
        assert!(html.contains("completeCall"));
        assert!(html.contains("failCall"));

        // The module script imports the component entry.
        assert!(html.contains(r#"await import("./Counter/index.js")"#));
    }
}
