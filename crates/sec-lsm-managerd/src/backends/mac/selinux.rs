//! SELinux policy backend.
//!
//! Installing an application generates a policy module (`.te`, `.if` and
//! `.fc` sources) in its own directory, builds it with the reference policy
//! development Makefile, loads it with `semodule` and relabels the
//! application paths with `restorecon`.

use std::fs;
use std::io;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use super::MacBackend;
use crate::backends::{BACKEND_TARGET, BackendError};
use crate::context::{Context, PathType};

/// Mount point of the SELinux filesystem.
pub const SELINUXFS: &str = "/sys/fs/selinux";

/// Makefile shipped with the SELinux policy development files.
pub const DEVEL_MAKEFILE: &str = "/usr/share/selinux/devel/Makefile";

/// Whether the running kernel enforces SELinux.
#[must_use]
pub fn is_available() -> bool {
    Utf8Path::new(SELINUXFS).join("enforce").exists()
}

/// Runs the policy tool chain.
pub trait PolicyTool {
    /// Runs `program` with `args` from directory `cwd`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Spawn`] when the program cannot start and
    /// [`BackendError::ToolFailed`] when it exits unsuccessfully.
    fn run(&self, program: &str, args: &[&str], cwd: &Utf8Path) -> Result<(), BackendError>;
}

/// [`PolicyTool`] spawning real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPolicyTool;

impl PolicyTool for SystemPolicyTool {
    fn run(&self, program: &str, args: &[&str], cwd: &Utf8Path) -> Result<(), BackendError> {
        debug!(target: BACKEND_TARGET, program, ?args, %cwd, "running policy tool");
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|source| BackendError::Spawn {
                program: program.to_owned(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        warn!(
            target: BACKEND_TARGET,
            program,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "policy tool failed"
        );
        Err(BackendError::ToolFailed {
            program: program.to_owned(),
            status: output.status,
        })
    }
}

/// SELinux implementation of [`MacBackend`].
pub struct SelinuxMac {
    modules_dir: Utf8PathBuf,
    tool: Box<dyn PolicyTool>,
}

impl SelinuxMac {
    /// Creates a backend generating modules below `modules_dir`.
    #[must_use]
    pub fn new(modules_dir: Utf8PathBuf) -> Self {
        Self {
            modules_dir,
            tool: Box::new(SystemPolicyTool),
        }
    }

    /// Runs the tool chain through `tool`.
    #[must_use]
    pub fn with_policy_tool(mut self, tool: Box<dyn PolicyTool>) -> Self {
        self.tool = tool;
        self
    }

    fn module_dir(&self, app_id: &str) -> Utf8PathBuf {
        self.modules_dir.join(app_id)
    }

    fn write_sources(
        dir: &Utf8Path,
        app_id: &str,
        context: &Context,
    ) -> Result<(), BackendError> {
        fs::create_dir_all(dir)
            .map_err(|source| BackendError::filesystem("create", dir, source))?;
        let module = module_name(app_id);
        for (extension, content) in [
            ("te", type_enforcement(&module, context)),
            ("if", interface(&module)),
            ("fc", file_contexts(&module, context)),
        ] {
            let path = dir.join(format!("{app_id}.{extension}"));
            fs::write(&path, content)
                .map_err(|source| BackendError::filesystem("write", &path, source))?;
        }
        Ok(())
    }
}

impl MacBackend for SelinuxMac {
    fn name(&self) -> &'static str {
        "selinux"
    }

    fn derive_label(&self, app_id: &str) -> String {
        format!("system_u:system_r:{}_t:s0", module_name(app_id))
    }

    fn install(&self, context: &Context) -> Result<(), BackendError> {
        let Some(id) = context.id() else {
            return Ok(());
        };
        let dir = self.module_dir(id);
        Self::write_sources(&dir, id, context)?;
        let package = format!("{id}.pp");
        self.tool.run("make", &["-f", DEVEL_MAKEFILE, &package], &dir)?;
        self.tool.run("semodule", &["-i", &package], &dir)?;
        for entry in context.paths() {
            self.tool.run("restorecon", &["-R", entry.path.as_str()], &dir)?;
        }
        info!(target: BACKEND_TARGET, id, module = %dir, "selinux module installed");
        Ok(())
    }

    fn uninstall(&self, context: &Context) -> Result<(), BackendError> {
        let Some(id) = context.id() else {
            return Ok(());
        };
        let dir = self.module_dir(id);
        if !dir.is_dir() {
            debug!(target: BACKEND_TARGET, id, "no selinux module to remove");
            return Ok(());
        }
        self.tool.run("semodule", &["-r", &module_name(id)], &self.modules_dir)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(BackendError::filesystem("remove", &dir, source)),
        }
        info!(target: BACKEND_TARGET, id, "selinux module removed");
        Ok(())
    }
}

fn module_name(app_id: &str) -> String {
    app_id.replace('-', "_")
}

fn type_suffix(kind: PathType) -> &'static str {
    match kind {
        PathType::Default => "file",
        other => other.as_str(),
    }
}

fn type_enforcement(module: &str, context: &Context) -> String {
    let mut lines = vec![
        format!("policy_module({module}, 1.0)"),
        String::new(),
        format!("type {module}_t;"),
        format!("domain_type({module}_t)"),
    ];
    for kind in [
        PathType::Default,
        PathType::Conf,
        PathType::Data,
        PathType::Exec,
        PathType::Http,
        PathType::Icon,
        PathType::Id,
        PathType::Lib,
        PathType::Plug,
        PathType::Public,
    ] {
        let file_type = format!("{module}_{}_t", type_suffix(kind));
        lines.push(format!("type {file_type};"));
        lines.push(format!("files_type({file_type})"));
        lines.push(format!("allow {module}_t {file_type}:file manage_file_perms;"));
        lines.push(format!("allow {module}_t {file_type}:dir manage_dir_perms;"));
    }
    lines.push(format!("domain_entry_file({module}_t, {module}_exec_t)"));
    for plug in context.plugs() {
        let importer = module_name(&plug.import_id);
        lines.push("optional_policy(`".to_owned());
        lines.push(format!("    gen_require(`type {importer}_t;')"));
        lines.push(format!("    {module}_plug_import({importer}_t)"));
        lines.push("')".to_owned());
    }
    lines.push(String::new());
    lines.join("\n")
}

fn interface(module: &str) -> String {
    format!(
        "## <summary>Policy of application {module}</summary>\n\n\
         interface(`{module}_plug_import',`\n\
         \tgen_require(`type {module}_plug_t;')\n\
         \tallow $1 {module}_plug_t:dir list_dir_perms;\n\
         \tallow $1 {module}_plug_t:file read_file_perms;\n\
         ')\n"
    )
}

fn file_contexts(module: &str, context: &Context) -> String {
    let paths = context
        .paths()
        .iter()
        .map(|entry| (entry.path.as_str(), type_suffix(entry.kind)));
    let plugs = context
        .plugs()
        .iter()
        .map(|plug| (plug.export_dir.as_str(), "plug"));
    paths
        .chain(plugs)
        .map(|(path, suffix)| {
            format!(
                "{}(/.*)?\tgen_context(system_u:object_r:{module}_{suffix}_t,s0)\n",
                escape_regex(path)
            )
        })
        .collect()
}

fn escape_regex(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        if "\\.+*?()[]{}^$|".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        commands: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    struct RecordingTool(Rc<Recorder>);

    impl PolicyTool for RecordingTool {
        fn run(&self, program: &str, args: &[&str], _cwd: &Utf8Path) -> Result<(), BackendError> {
            self.0
                .commands
                .borrow_mut()
                .push(format!("{program} {}", args.join(" ")));
            if self.0.fail_on == Some(program) {
                return Err(BackendError::Spawn {
                    program: program.to_owned(),
                    source: io::Error::other("unavailable"),
                });
            }
            Ok(())
        }
    }

    fn backend(dir: &TempDir, recorder: &Rc<Recorder>) -> (Utf8PathBuf, SelinuxMac) {
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
        let mac = SelinuxMac::new(root.join("selinux"))
            .with_policy_tool(Box::new(RecordingTool(Rc::clone(recorder))));
        (root, mac)
    }

    #[test]
    fn label_replaces_dashes() {
        let mac = SelinuxMac::new(Utf8PathBuf::from("/unused"));
        assert_eq!(mac.derive_label("my-app"), "system_u:system_r:my_app_t:s0");
    }

    #[test]
    fn install_generates_module_and_runs_tool_chain() {
        let dir = TempDir::new().expect("temp dir");
        let recorder = Rc::new(Recorder::default());
        let (root, mac) = backend(&dir, &recorder);
        let conf = root.join("app.conf");
        fs::write(&conf, b"key=value").expect("conf file");

        let mut context = Context::new();
        context.set_id("my-app").expect("id");
        context.add_path(conf.as_str(), PathType::Conf).expect("path");

        mac.install(&context).expect("install");

        let module = root.join("selinux").join("my-app");
        let te = fs::read_to_string(module.join("my-app.te")).expect("te file");
        assert!(te.starts_with("policy_module(my_app, 1.0)"));
        let fc = fs::read_to_string(module.join("my-app.fc")).expect("fc file");
        assert!(fc.contains("app\\.conf(/.*)?\tgen_context(system_u:object_r:my_app_conf_t,s0)"));
        assert!(module.join("my-app.if").exists());
        assert_eq!(
            recorder.commands.borrow().as_slice(),
            [
                format!("make -f {DEVEL_MAKEFILE} my-app.pp"),
                "semodule -i my-app.pp".to_owned(),
                format!("restorecon -R {conf}"),
            ]
        );
    }

    #[test]
    fn failing_tool_aborts_install() {
        let dir = TempDir::new().expect("temp dir");
        let recorder = Rc::new(Recorder {
            fail_on: Some("semodule"),
            ..Recorder::default()
        });
        let (_root, mac) = backend(&dir, &recorder);
        let mut context = Context::new();
        context.set_id("demo").expect("id");

        let error = mac.install(&context).expect_err("semodule fails");
        assert!(matches!(error, BackendError::Spawn { .. }));
        assert_eq!(recorder.commands.borrow().len(), 2);
    }

    #[test]
    fn uninstall_removes_module() {
        let dir = TempDir::new().expect("temp dir");
        let recorder = Rc::new(Recorder::default());
        let (root, mac) = backend(&dir, &recorder);
        let mut context = Context::new();
        context.set_id("demo").expect("id");
        mac.install(&context).expect("install");

        mac.uninstall(&context).expect("uninstall");

        assert!(!root.join("selinux").join("demo").exists());
        assert_eq!(
            recorder.commands.borrow().last().map(String::as_str),
            Some("semodule -r demo")
        );
    }
}
