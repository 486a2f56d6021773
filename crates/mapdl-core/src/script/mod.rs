//! Control script the engine runs for the lifetime of a session.
//!
//! The script defines the instance table, converts neutral models once, then
//! loops: raise ready, wait for go, read the instance index, and either stop
//! (negative index) or run one full prep/solve/post iteration for the
//! selected instance, writing its result file.

mod checkpoint;
mod hooks;

pub use checkpoint::ParameterCheckpoint;
pub use hooks::{CustomizationHooks, HookPhase, read_hook_file};

use crate::components::GroupKind;
use crate::layout::{
    INDEX_EXT_PARAM, INDEX_FILE_PARAM, INPUT_EXTENSION, POST_EXTENSION, RESULT_EXTENSION,
    SOLVE_EXTENSION,
};
use crate::output::{NODE_LABELS, RESULT_CLASS_NAME};
use crate::registry::{Instance, InstanceRegistry, split_model_path};
use crate::signal::{SignalChannel, SignalPair};
use crate::support::text::format_engine_number;
use std::time::Duration;

const TABLE: &str = "SES_TBL";
const INDEX_ARRAY: &str = "SES_IDX";
const INDEX_VALUE: &str = "SES_IV";
const LOOP_FLAG: &str = "SES_LOOP";
const UNITS_PARAM: &str = "SES_UNITS";
const NODE_ARRAY: &str = "SES_NARR";
const PARAMETER_EXTENSION: &str = "prm";

/// Columns of the instance table.
const COLUMN_NAME: usize = 1;
const COLUMN_STEM: usize = 2;
const COLUMN_EXT: usize = 3;

/// Everything the generator reads. Borrowed from the controller.
pub struct ScriptContext<'a> {
    pub session_name: &'a str,
    pub registry: &'a InstanceRegistry,
    pub signals: &'a SignalPair,
    pub channel: &'a dyn SignalChannel,
    pub timeout: Duration,
    pub hooks: &'a CustomizationHooks,
}

#[derive(Default)]
struct ScriptWriter {
    lines: Vec<String>,
}

impl ScriptWriter {
    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn extend<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
    }

    fn comment(&mut self, text: &str) {
        self.lines.push(format!("/COM, {}", text));
    }

    fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

pub fn generate_script(context: &ScriptContext<'_>) -> String {
    let mut writer = ScriptWriter::default();
    let checkpoint = ParameterCheckpoint::new(context.session_name, PARAMETER_EXTENSION);

    write_preamble(&mut writer, context);
    write_instance_table(&mut writer, context.registry);
    write_derivations(&mut writer, context.registry, &checkpoint);
    write_loop(&mut writer, context, &checkpoint);
    write_epilogue(&mut writer);

    writer.finish()
}

fn write_preamble(writer: &mut ScriptWriter, context: &ScriptContext<'_>) {
    writer.push("/BATCH");
    writer.push(format!("/TITLE, Session {}", context.session_name));
    writer.comment(&format!(
        "{} instance(s), handshake signals {} / {}",
        context.registry.len(),
        context.signals.ready,
        context.signals.go
    ));
    writer.push("FINISH");
    writer.push("/PREP7");
}

fn write_instance_table(writer: &mut ScriptWriter, registry: &InstanceRegistry) {
    writer.comment("Instance table: name, model stem, model extension");
    writer.push(format!(
        "*DIM,{},STRING,{},{},3",
        TABLE,
        registry.column_width(),
        registry.len().max(1)
    ));
    for instance in registry.instances() {
        let (stem, ext) = split_model_path(instance.native_model_path());
        let row = instance.index();
        writer.push(format!("{}(1,{},{})='{}'", TABLE, row, COLUMN_NAME, instance.name()));
        writer.push(format!("{}(1,{},{})='{}'", TABLE, row, COLUMN_STEM, stem));
        writer.push(format!("{}(1,{},{})='{}'", TABLE, row, COLUMN_EXT, ext));
    }
}

fn write_derivations(
    writer: &mut ScriptWriter,
    registry: &InstanceRegistry,
    checkpoint: &ParameterCheckpoint,
) {
    for instance in registry.instances().iter().filter(|i| i.needs_derivation()) {
        write_derivation(writer, instance, checkpoint);
    }
}

fn write_derivation(
    writer: &mut ScriptWriter,
    instance: &Instance,
    checkpoint: &ParameterCheckpoint,
) {
    let (source_stem, source_ext) = split_model_path(instance.source_model_path());
    let (native_stem, native_ext) = split_model_path(instance.native_model_path());
    let material = instance.material();

    writer.comment(&format!("Derive native model for {}", instance.name()));
    writer.push(checkpoint.persist());
    writer.push("/PREP7");
    writer.push(format!("CDREAD,DB,'{}','{}'", source_stem, source_ext));
    for (label, value) in ["EX", "EY", "EZ"].iter().zip(material.elasticity) {
        writer.push(format!("MP,{},1,{}", label, format_engine_number(value)));
    }
    for (label, value) in ["NUXY", "NUYZ", "NUXZ"].iter().zip(material.poisson_ratio) {
        writer.push(format!("MP,{},1,{}", label, format_engine_number(value)));
    }
    writer.push(format!("SAVE,'{}','{}'", native_stem, native_ext));
    writer.extend(ParameterCheckpoint::clear_database());
    writer.push(checkpoint.restore_fresh());
}

fn write_loop(
    writer: &mut ScriptWriter,
    context: &ScriptContext<'_>,
    checkpoint: &ParameterCheckpoint,
) {
    let name = format!("{}(1,{},{})", TABLE, INDEX_VALUE, COLUMN_NAME);
    let stem = format!("{}(1,{},{})", TABLE, INDEX_VALUE, COLUMN_STEM);
    let ext = format!("{}(1,{},{})", TABLE, INDEX_VALUE, COLUMN_EXT);

    writer.push(format!("*DIM,{},ARRAY,1", INDEX_ARRAY));
    writer.push(format!("{}=1", LOOP_FLAG));
    writer.push(format!("*DOWHILE,{}", LOOP_FLAG));
    writer.push(format!(
        "/SYS,{}",
        context.channel.engine_raise_command(&context.signals.ready)
    ));
    writer.push(format!(
        "/SYS,{}",
        context
            .channel
            .engine_await_command(&context.signals.go, context.timeout)
    ));
    writer.push(format!(
        "*VREAD,{}(1),{},{}",
        INDEX_ARRAY, INDEX_FILE_PARAM, INDEX_EXT_PARAM
    ));
    writer.push("(F2.0)");
    writer.push(format!("{}={}(1)", INDEX_VALUE, INDEX_ARRAY));
    writer.push(checkpoint.persist());
    writer.push(format!("*IF,{},LT,0,THEN", INDEX_VALUE));
    writer.push(format!("{}=0", LOOP_FLAG));
    writer.push("*ELSE");

    writer.push("FINISH");
    writer.push(format!("/FILNAME,{},0", name));
    writer.push("/PREP7");
    writer.push(format!("RESUME,{},{}", stem, ext));
    writer.push("ALLSEL");
    writer.push(checkpoint.restore_merge());
    writer.push(format!("/INPUT,{},{}", name, INPUT_EXTENSION));
    writer.extend(context.hooks.prep.iter().cloned());
    writer.push("FINISH");

    writer.push("/SOLU");
    writer.extend(context.hooks.solution.iter().cloned());
    writer.push(format!("/INPUT,{},{}", name, SOLVE_EXTENSION));
    writer.push("FINISH");

    writer.push("/POST1");
    writer.push("SET,FIRST");
    writer.extend(context.hooks.post.iter().cloned());
    writer.push(format!("/INPUT,{},{}", name, POST_EXTENSION));
    write_result_export(writer, &name);
    writer.push("FINISH");

    writer.push("*ENDIF");
    writer.push("*ENDDO");
}

fn write_result_export(writer: &mut ScriptWriter, name: &str) {
    let labels = NODE_LABELS
        .iter()
        .map(|label| format!("'{}'", label))
        .collect::<Vec<_>>()
        .join(", ");

    writer.push(format!("*GET,{},ACTIVE,0,UNITS", UNITS_PARAM));
    writer.push(format!("*CFOPEN,{},{}", name, RESULT_EXTENSION));
    write_literal_line(writer, &format!("class {}:", RESULT_CLASS_NAME));
    write_literal_line(writer, "    def __init__(self):");
    write_literal_line(writer, &format!("        self.nodeLabels = [{}]", labels));
    writer.push(format!("*VWRITE,{}", UNITS_PARAM));
    writer.push("('        self.units = ',F3.0)");
    write_literal_line(writer, "        self.coordinateSystem = 'Cartesian'");
    write_literal_line(writer, "        self.nodeMap = {");

    writer.push("*GET,SES_NCMP,COMP,,NCOMP");
    writer.push("*DO,SES_J,1,SES_NCMP,1");
    writer.push("*GET,SES_CNAME,COMP,SES_J,NAME");
    writer.push("*GET,SES_CTYPE,COMP,SES_CNAME,TYPE");
    writer.push("SES_GETV=0");
    writer.push("ALLSEL");
    writer.push("CMSEL,S,SES_CNAME");
    for (position, kind) in GroupKind::ALL.iter().enumerate() {
        let keyword = if position == 0 { "*IF" } else { "*ELSEIF" };
        writer.push(format!(
            "{},SES_CTYPE,EQ,{},THEN",
            keyword,
            kind.engine_component_type()
        ));
        if let Some(select) = kind.node_selection() {
            writer.push(select);
        }
        writer.push("SES_GETV=1");
    }
    writer.push("*ENDIF");

    writer.push("*IF,SES_GETV,EQ,1,THEN");
    writer.push("*GET,SES_NCNT,NODE,,COUNT");
    writer.push("*VWRITE,SES_CNAME");
    writer.push("('            ''',A,''': [')");
    writer.push(format!("*DEL,{},,NOPR", NODE_ARRAY));
    writer.push(format!("*DIM,{},ARRAY,SES_NCNT,{}", NODE_ARRAY, NODE_LABELS.len()));
    writer.push(format!("*VGET,{}(1,1),NODE,1,NLIST", NODE_ARRAY));
    writer.push("*DO,SES_I,1,SES_NCNT,1");
    writer.push(format!("SES_N={}(SES_I,1)", NODE_ARRAY));
    writer.push(format!("{}(SES_I,2)=UX(SES_N)", NODE_ARRAY));
    writer.push(format!("{}(SES_I,3)=UY(SES_N)", NODE_ARRAY));
    writer.push(format!("{}(SES_I,4)=UZ(SES_N)", NODE_ARRAY));
    // Radial displacement carries the sign of the dominant in-plane component.
    writer.push("SES_R=SQRT(UX(SES_N)**2+UY(SES_N)**2)");
    writer.push("SES_AX=ABS(UX(SES_N))");
    writer.push("SES_AY=ABS(UY(SES_N))");
    writer.push("*IF,SES_AX,GT,SES_AY,THEN");
    writer.push("SES_R=SIGN(SES_R,UX(SES_N))");
    writer.push("*ELSE");
    writer.push("SES_R=SIGN(SES_R,UY(SES_N))");
    writer.push("*ENDIF");
    writer.push(format!("{}(SES_I,5)=SES_R", NODE_ARRAY));
    writer.push(format!("{}(SES_I,6)=TEMP(SES_N)", NODE_ARRAY));
    for (column, component) in [(7, "FX"), (8, "FY"), (9, "FZ")] {
        writer.push(format!(
            "*GET,{}(SES_I,{}),NODE,SES_N,RF,{}",
            NODE_ARRAY, column, component
        ));
    }
    writer.push("*ENDDO");
    let columns = (1..=NODE_LABELS.len())
        .map(|column| format!("{}(1,{})", NODE_ARRAY, column))
        .collect::<Vec<_>>()
        .join(",");
    writer.push(format!("*VWRITE,{}", columns));
    writer.push("('                [',F10.0,8(',',E16.8),'],')");
    write_literal_line(writer, "            ],");
    writer.push("*ENDIF");
    writer.push("*ENDDO");

    write_literal_line(writer, "        }");
    writer.push("*CFCLOSE");
}

/// A constant line in the result file. `*VWRITE` without arguments writes its
/// format line verbatim.
fn write_literal_line(writer: &mut ScriptWriter, text: &str) {
    writer.push("*VWRITE");
    writer.push(format!("('{}')", text.replace('\'', "''")));
}

fn write_epilogue(writer: &mut ScriptWriter) {
    writer.comment("Session finished");
    writer.push("*CFCLOSE");
    writer.push("FINISH");
    writer.push("/EXIT,NOSAVE");
}
