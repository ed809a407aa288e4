//! Helm values templates compiled into the binary, addressed by
//! `<featureSet>/<feature>.yaml`.
//!
//! Templates are minijinja with the start uid bound as `uid`, written
//! `{{ uid }}`. Go template syntax such as `{{ .uid }}` does not parse and
//! renders as [`PLACEHOLDER`].

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use minijinja::{Environment, UndefinedBehavior, context};
use tracing::warn;

use crate::error::SccError;

/// Entry value written when a template is missing or fails to render.
pub const PLACEHOLDER: &str = "{}";

const EMBEDDED_TEMPLATES: &[(&str, &str)] = &[
    ("ace.yaml", include_str!("../../featuresets/ace.yaml")),
    (
        "openshift/ace.yaml",
        include_str!("../../featuresets/openshift/ace.yaml"),
    ),
    (
        "openshift/kube-ui-server.yaml",
        include_str!("../../featuresets/openshift/kube-ui-server.yaml"),
    ),
    (
        "openshift/kubedb.yaml",
        include_str!("../../featuresets/openshift/kubedb.yaml"),
    ),
    (
        "openshift/kubestash.yaml",
        include_str!("../../featuresets/openshift/kubestash.yaml"),
    ),
    (
        "openshift/kubevault.yaml",
        include_str!("../../featuresets/openshift/kubevault.yaml"),
    ),
    (
        "openshift/license-proxyserver.yaml",
        include_str!("../../featuresets/openshift/license-proxyserver.yaml"),
    ),
];

static EMBEDDED: LazyLock<Arc<TemplateCatalog>> = LazyLock::new(|| {
    Arc::new(TemplateCatalog::from_sources(EMBEDDED_TEMPLATES.iter().copied()))
});

pub fn feature_path(feature_set: &str, feature: &str) -> String {
    format!("{}/{}.yaml", feature_set, feature)
}

/// Read-only set of named templates.
pub struct TemplateCatalog {
    sources: BTreeMap<String, String>,
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCatalog")
            .field("templates", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateCatalog {
    /// The catalog bundled at build time.
    pub fn embedded() -> Arc<TemplateCatalog> {
        EMBEDDED.clone()
    }

    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self {
            sources: sources
                .into_iter()
                .map(|(p, s)| (p.to_string(), s.to_string()))
                .collect(),
            env,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.sources.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Renders `path` with `uid` bound and trims surrounding whitespace.
    pub fn render(&self, path: &str, uid: i64) -> Result<Vec<u8>, SccError> {
        let source = self
            .sources
            .get(path)
            .ok_or_else(|| SccError::TemplateNotFound(path.to_string()))?;
        let out = self
            .env
            .render_str(source, context! { uid => uid })
            .map_err(|e| SccError::Render {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(out.trim().as_bytes().to_vec())
    }

    /// Rendered entry value, or [`PLACEHOLDER`] if rendering failed.
    pub fn render_or_placeholder(&self, path: &str, uid: i64) -> String {
        match self.render(path, uid) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(%path, uid, error = %e, "render failed; writing placeholder");
                PLACEHOLDER.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_renders_every_template() {
        let catalog = TemplateCatalog::embedded();
        assert!(catalog.contains("ace.yaml"));
        for path in catalog.paths() {
            let out = catalog.render(path, 5000).unwrap();
            let text = String::from_utf8(out).unwrap();
            assert!(text.contains("5000"), "{path}");
            assert_eq!(text, text.trim());
        }
    }

    #[test]
    fn render_is_deterministic() {
        let catalog = TemplateCatalog::embedded();
        let path = feature_path("openshift", "kubedb");
        let a = catalog.render(&path, 5000).unwrap();
        let b = catalog.render(&path, 5000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn output_is_trimmed() {
        let catalog = TemplateCatalog::from_sources([(
            "x/y.yaml",
            "\n\n  runAsUser: {{ uid }}  \n\n",
        )]);
        assert_eq!(catalog.render("x/y.yaml", 7).unwrap(), b"runAsUser: 7");
    }

    #[test]
    fn missing_template() {
        let catalog = TemplateCatalog::embedded();
        let err = catalog.render("openshift/nope.yaml", 1).unwrap_err();
        assert!(matches!(err, SccError::TemplateNotFound(_)));
        assert_eq!(
            catalog.render_or_placeholder("openshift/nope.yaml", 1),
            PLACEHOLDER
        );
    }

    #[test]
    fn malformed_template() {
        let catalog = TemplateCatalog::from_sources([
            ("bad/syntax.yaml", "runAsUser: {{ uid "),
            ("bad/undefined.yaml", "runAsUser: {{ gid }}"),
        ]);
        for path in ["bad/syntax.yaml", "bad/undefined.yaml"] {
            assert!(matches!(
                catalog.render(path, 1),
                Err(SccError::Render { .. })
            ));
            assert_eq!(catalog.render_or_placeholder(path, 1), PLACEHOLDER);
        }
    }

    #[test]
    fn go_template_syntax_falls_back() {
        let catalog =
            TemplateCatalog::from_sources([("go/x.yaml", "runAsUser: {{ .uid }}")]);
        assert!(matches!(
            catalog.render("go/x.yaml", 1),
            Err(SccError::Render { .. })
        ));
        assert_eq!(catalog.render_or_placeholder("go/x.yaml", 1), PLACEHOLDER);
    }
}
