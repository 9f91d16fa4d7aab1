// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTML snapshot of the live DOM
//!
//! Raw mode hands back the browser's serialized document unchanged.
//! Sanitized mode (the default) rebuilds the document in-page: scripts go
//! (JSON-LD structured data stays), HTML imports go, a `<base>` pointing
//! at the page's own origin+path is injected when absent so relative
//! assets keep resolving, root-relative asset paths become absolute, and
//! comments are stripped. The original doctype, when present, prefixes
//! the output.

use serde::{Deserialize, Serialize};

use super::Artifact;
use crate::browser::Session;
use crate::error::{Error, Result};

const SANITIZE_SCRIPT: &str = r#"
(() => {
  let output = '';
  if (document.doctype) {
    output = new XMLSerializer().serializeToString(document.doctype);
  }

  const root = document.documentElement.cloneNode(true);

  root.querySelectorAll('script:not([type="application/ld+json"])')
    .forEach((node) => node.parentNode.removeChild(node));
  root.querySelectorAll('link[rel=import]')
    .forEach((node) => node.parentNode.removeChild(node));

  const { origin, pathname } = location;
  if (!root.querySelector('base')) {
    const head = root.querySelector('head');
    if (head) {
      const base = document.createElement('base');
      base.href = origin + pathname;
      head.appendChild(base);
    }
  }

  root.querySelectorAll('link[href^="/"], script[src^="/"], img[src^="/"]')
    .forEach((el) => {
      const src = el.getAttribute('src');
      const href = el.getAttribute('href');
      if (src && /^\/[^/]/.test(src)) {
        el.src = origin + src;
      } else if (href && /^\/[^/]/.test(href)) {
        el.href = origin + href;
      }
    });

  output += root.outerHTML;
  return output.replace(/<!--[\s\S]*?-->/g, '');
})()
"#;

/// Render options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Return the serialized DOM as-is instead of sanitizing
    pub raw: bool,
}

pub(super) async fn capture(session: &Session, opts: &RenderOptions) -> Result<Artifact> {
    let page = session.page();

    let html = if opts.raw {
        page.content().await?
    } else {
        let result = page.evaluate(SANITIZE_SCRIPT).await?;
        let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::other("sanitized render produced no document"))?
    };

    Ok(Artifact {
        content_type: "text/html; charset=UTF-8",
        bytes: html.into_bytes(),
    })
}
