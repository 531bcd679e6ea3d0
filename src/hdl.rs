//! Verilog text building blocks shared by all generated cores.

use core::fmt::{self, Write};
use std::path::Path;

use crate::ResetPolicy;

/// Module name for an output file: directory and extension stripped.
///
/// Characters that are not legal in a Verilog identifier become `_`.
pub fn module_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("core");
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Path of a coefficient table next to the module file.
///
/// `rtl/quadtbl.v` with suffix `_ctbl` gives `rtl/quadtbl_ctbl.hex`.
pub fn table_path(file_name: &str, suffix: &str) -> String {
    let stem = file_name.strip_suffix(".v").unwrap_or(file_name);
    format!("{stem}{suffix}.hex")
}

/// Table file name as `$readmemh` sees it, relative to the simulation
/// directory
pub(crate) fn readmem_name(file_name: &str, suffix: &str) -> String {
    let path = table_path(file_name, suffix);
    Path::new(&path)
        .file_name()
        .and_then(|f| f.to_str())
        .map_or_else(|| path.clone(), String::from)
}

impl ResetPolicy {
    /// Reset port name
    pub fn port(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Sync => Some("i_reset"),
            Self::Async => Some("i_areset_n"),
        }
    }

    /// Clocked block head including the reset condition
    fn always_head(&self) -> &'static str {
        match self {
            Self::None => "\talways @(posedge i_clk)\n",
            Self::Sync => "\talways @(posedge i_clk)\n\tif (i_reset)\n",
            Self::Async => "\talways @(posedge i_clk, negedge i_areset_n)\n\tif (!i_areset_n)\n",
        }
    }
}

/// A generated Verilog module
pub trait Verilog {
    /// Write the complete module text
    fn write_module<W: Write>(&self, w: &mut W) -> fmt::Result;

    /// Render the module into a string
    fn module_text(&self) -> Result<String, fmt::Error> {
        let mut s = String::new();
        self.write_module(&mut s)?;
        Ok(s)
    }
}

/// Port direction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Input,
    Output,
}

/// One port declaration line
#[derive(Clone, Debug)]
pub(crate) struct Port {
    pub dir: Dir,
    pub reg: bool,
    pub signed: bool,
    pub range: Option<String>,
    pub names: Vec<&'static str>,
}

impl Port {
    pub fn input(names: &[&'static str]) -> Self {
        Self {
            dir: Dir::Input,
            reg: false,
            signed: false,
            range: None,
            names: names.to_vec(),
        }
    }

    pub fn output(names: &[&'static str]) -> Self {
        Self {
            dir: Dir::Output,
            reg: true,
            ..Self::input(names)
        }
    }

    pub fn wire(mut self) -> Self {
        self.reg = false;
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// `[(msb):0]`
    pub fn width(mut self, msb: &str) -> Self {
        self.range = Some(format!("[({msb}):0]"));
        self
    }
}

/// File banner
pub(crate) fn banner(w: &mut impl Write, file_name: &str, purpose: &str) -> fmt::Result {
    let rule = "/".repeat(80);
    writeln!(w, "{rule}")?;
    writeln!(w, "//")?;
    writeln!(w, "// Filename:\t{file_name}")?;
    writeln!(w, "//")?;
    for (i, line) in purpose.lines().enumerate() {
        if i == 0 {
            writeln!(w, "// Purpose:\t{line}")?;
        } else {
            writeln!(w, "//\t\t{line}")?;
        }
    }
    writeln!(w, "//")?;
    writeln!(
        w,
        "// Generated by {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(w, "//")?;
    writeln!(w, "{rule}")?;
    writeln!(w, "`default_nettype\tnone")
}

/// `module name #(localparams) (ports);`
///
/// Clock, optional reset and the listed control inputs lead the port list.
pub(crate) fn module_head(
    w: &mut impl Write,
    name: &str,
    params: &[(&str, u32, &str)],
    reset: ResetPolicy,
    controls: &[&'static str],
    ports: &[Port],
) -> fmt::Result {
    writeln!(w, "module\t{name} #(")?;
    writeln!(w, "\t\t// {{{{{{")?;
    for (i, (p, v, comment)) in params.iter().enumerate() {
        let lead = if i == 0 { "\t\tlocalparam\t" } else { "\t\t\t\t" };
        let sep = if i + 1 == params.len() { ' ' } else { ',' };
        writeln!(w, "{lead}{p}={v:2}{sep}\t// {comment}")?;
    }
    writeln!(w, "\t\t// }}}}}}")?;
    writeln!(w, "\t) (")?;
    writeln!(w, "\t\t// {{{{{{")?;
    let mut clocks = vec!["i_clk"];
    clocks.extend(reset.port());
    clocks.extend(controls);
    let mut lines = vec![format!("\t\tinput\twire\t\t\t\t{}", clocks.join(", "))];
    for p in ports {
        let dir = match p.dir {
            Dir::Input => "input",
            Dir::Output => "output",
        };
        let kind = if p.reg { "reg" } else { "wire" };
        let signed = if p.signed { "signed" } else { "" };
        let range = p.range.as_deref().unwrap_or("\t");
        lines.push(format!(
            "\t\t{dir}\t{kind}\t{signed}\t{range}\t{}",
            p.names.join(", ")
        ));
    }
    writeln!(w, "{}", lines.join(",\n"))?;
    writeln!(w, "\t\t// }}}}}}")?;
    writeln!(w, "\t);\n")
}

/// A clocked register block.
///
/// `zero` registers get an `initial` value and are cleared by the reset.
/// `enable` guards the body.
pub(crate) fn always(
    w: &mut impl Write,
    reset: ResetPolicy,
    zero: &[&str],
    enable: Option<&str>,
    body: &[String],
) -> fmt::Result {
    let init: Vec<_> = zero.iter().map(|r| (*r, "0")).collect();
    always_init(w, reset, &init, enable, body)
}

/// As [`always`] with explicit `(register, value)` initial and reset values.
pub(crate) fn always_init(
    w: &mut impl Write,
    reset: ResetPolicy,
    init: &[(&str, &str)],
    enable: Option<&str>,
    body: &[String],
) -> fmt::Result {
    for (r, v) in init {
        writeln!(w, "\tinitial\t{r} = {v};")?;
    }
    let head = if init.is_empty() {
        ResetPolicy::None.always_head()
    } else {
        reset.always_head()
    };
    write!(w, "{head}")?;
    let mut tail = "\t";
    if reset != ResetPolicy::None && !init.is_empty() {
        writeln!(w, "\tbegin")?;
        for (r, v) in init {
            writeln!(w, "\t\t{r} <= {v};")?;
        }
        tail = "\tend else ";
    }
    match enable {
        Some(en) => writeln!(w, "{tail}if ({en})")?,
        None if tail == "\t" => {}
        None => writeln!(w, "{tail}")?,
    }
    writeln!(w, "\tbegin")?;
    for line in body {
        writeln!(w, "\t\t{line}")?;
    }
    writeln!(w, "\tend")
}

/// Open a `// {{{` fold with a section title
pub(crate) fn section(w: &mut impl Write, title: &str) -> fmt::Result {
    writeln!(w, "\t// {title}")?;
    writeln!(w, "\t// {{{{{{")
}

/// Close a `// }}}` fold
pub(crate) fn end_section(w: &mut impl Write) -> fmt::Result {
    writeln!(w, "\t// }}}}}}\n")
}

/// `{(n){1'b0}}` style replication, or an empty string for zero
pub(crate) fn zeros(n: u32) -> String {
    if n == 0 {
        String::new()
    } else {
        format!(", {{({n}){{1'b0}}}}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(module_name("rtl/seqpolar.v"), "seqpolar");
        assert_eq!(module_name("my-core.v"), "my_core");
        assert_eq!(module_name("1x.v"), "_1x");
        assert_eq!(table_path("rtl/quadtbl.v", "_ltbl"), "rtl/quadtbl_ltbl.hex");
        assert_eq!(table_path("sintable", ""), "sintable.hex");
        assert_eq!(readmem_name("rtl/quadtbl.v", "_qtbl"), "quadtbl_qtbl.hex");
    }

    fn block(reset: ResetPolicy, zero: &[&str], enable: Option<&str>) -> String {
        let mut s = String::new();
        always(&mut s, reset, zero, enable, &["o_val <= i_val;".into()]).unwrap();
        s
    }

    #[test]
    fn reset_styles() {
        let s = block(ResetPolicy::Sync, &["o_val"], Some("i_ce"));
        assert!(s.contains("\tinitial\to_val = 0;\n"));
        assert!(s.contains("\tif (i_reset)\n\tbegin\n\t\to_val <= 0;\n\tend else if (i_ce)\n"));

        let s = block(ResetPolicy::Async, &["o_val"], None);
        assert!(s.contains("negedge i_areset_n"));
        assert!(s.contains("\tend else \n\tbegin\n"));

        let s = block(ResetPolicy::None, &["o_val"], Some("i_ce"));
        assert!(!s.contains("reset"));
        assert!(s.contains("\talways @(posedge i_clk)\n\tif (i_ce)\n\tbegin\n"));

        let s = block(ResetPolicy::Sync, &[], Some("i_ce"));
        assert!(!s.contains("reset"));
    }

    #[test]
    fn head() {
        let mut s = String::new();
        module_head(
            &mut s,
            "cordic",
            &[("IW", 12, "input bits"), ("OW", 12, "output bits")],
            ResetPolicy::Async,
            &["i_ce"],
            &[
                Port::input(&["i_xval", "i_yval"]).signed().width("IW-1"),
                Port::output(&["o_aux"]),
            ],
        )
        .unwrap();
        assert!(s.contains("module\tcordic #("));
        assert!(s.contains("localparam\tIW=12,"));
        assert!(s.contains("OW=12 \t"));
        assert!(s.contains("i_clk, i_areset_n, i_ce,\n"));
        assert!(s.contains("input\twire\tsigned\t[(IW-1):0]\ti_xval, i_yval,\n"));
        assert!(s.contains("output\treg\t\t\t\to_aux\n"));
    }
}
