//! Manifest staging on the configuration authority
//!
//! A scenario names resource bodies; staging one means overwriting the
//! authority's main manifest with a `node default` block holding that body.
//! The result is a plain shell command for the authority.

/// Heredoc terminator; quoted so the shell does not expand `$` in manifests
const HEREDOC_TAG: &str = "CONFCHECK_MANIFEST";

/// Builds manifest-staging commands for one manifest path
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    manifest_path: String,
}

impl ManifestBuilder {
    pub fn new(manifest_path: impl Into<String>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
        }
    }

    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    /// Wrap a resource body in the default node
    pub fn render(body: &str) -> String {
        let mut out = String::from("node default {\n");
        for line in body.trim_end().lines() {
            if line.is_empty() {
                out.push('\n');
            } else {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str("}\n");
        out
    }

    /// Shell command that writes the rendered manifest to the authority
    pub fn stage(&self, body: &str) -> String {
        format!(
            "cat <<'{tag}' > {path}\n{manifest}{tag}",
            tag = HEREDOC_TAG,
            path = crate::agent::shell_quote(&self.manifest_path),
            manifest = Self::render(body),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESENT: &str = "cisco_provider { 'test':\n  ensure => present,\n}\n";

    #[test]
    fn test_render_indents_body_in_node_default() {
        assert_eq!(
            ManifestBuilder::render(PRESENT),
            "node default {\n  cisco_provider { 'test':\n    ensure => present,\n  }\n}\n"
        );
    }

    #[test]
    fn test_stage_writes_heredoc_to_manifest_path() {
        let path = "/etc/puppetlabs/code/environments/production/manifests/site.pp";
        let cmd = ManifestBuilder::new(path).stage(PRESENT);

        assert!(cmd.starts_with(&format!("cat <<'CONFCHECK_MANIFEST' > '{}'\n", path)));
        assert!(cmd.contains("node default {\n"));
        assert!(cmd.ends_with("}\nCONFCHECK_MANIFEST"));
    }

    #[test]
    fn test_stage_is_pure() {
        let builder = ManifestBuilder::new("/tmp/site.pp");
        assert_eq!(builder.stage(PRESENT), builder.stage(PRESENT));
    }
}
