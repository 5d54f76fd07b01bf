//! hclass REPL
//!
//! Interactive shell for poking at the object model: create objects, set and
//! delete properties, re-parent them and watch shapes and change markers.
//! With a file argument the commands are read from the file instead.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use hclass::runtime::ChangeMarker;
use hclass::{Context, IntegrityLevel, JsResult, ObjectId, ObjectModelConfig, Value};

const HELP: &str = "\
commands:
  new <name> [proto|null]     create an object (default proto: Object.prototype)
  set <obj> <key> <value>     assign a property
  get <obj> <key>             read a property
  del <obj> <key>             delete a property
  has <obj> <key>             `key in obj`
  keys <obj>                  own property keys
  forin <obj>                 for-in keys
  proto <obj> <proto|null>    change the prototype
  shape <obj>                 show the object's shape
  freeze <obj> | seal <obj>   set an integrity level
  track <obj>                 enable prototype change tracking
  marker <obj>                show the tracked marker
  gc                          collect garbage
values: integers, true, false, null, undefined or an object name";

struct Session {
    ctx: Context,
    names: FxHashMap<String, ObjectId>,
    markers: FxHashMap<String, Rc<ChangeMarker>>,
}

impl Session {
    fn new(config: ObjectModelConfig) -> Result<Self, hclass::ConfigError> {
        Ok(Session {
            ctx: Context::with_config(config)?,
            names: FxHashMap::default(),
            markers: FxHashMap::default(),
        })
    }

    fn object(&self, name: &str) -> Result<ObjectId, String> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| format!("unknown object '{}'", name))
    }

    fn value(&self, text: &str) -> Result<Value, String> {
        match text {
            "undefined" => Ok(Value::undefined()),
            "null" => Ok(Value::null()),
            "true" => Ok(Value::bool(true)),
            "false" => Ok(Value::bool(false)),
            _ => match text.parse::<i32>() {
                Ok(n) if hclass::value::fits_in_short_int(n) => Ok(Value::int(n)),
                Ok(_) => Err(format!("integer out of range: {}", text)),
                Err(_) => self.object(text).map(Value::object),
            },
        }
    }

    fn proto(&self, text: Option<&str>) -> Result<Option<ObjectId>, String> {
        match text {
            None => Ok(Some(self.ctx.object_prototype())),
            Some("null") => Ok(None),
            Some(name) => self.object(name).map(Some),
        }
    }

    fn show(&self, value: Value) -> String {
        match value.to_object() {
            Some(id) => self
                .names
                .iter()
                .find(|&(_, &v)| v == id)
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| value.to_string()),
            None => value.to_string(),
        }
    }

    fn run(&mut self, line: &str) -> Result<String, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let js = |r: JsResult<String>| r.map_err(|e| e.to_string());
        match words.as_slice() {
            ["help"] => Ok(HELP.to_string()),
            ["new", name, rest @ ..] if rest.len() <= 1 => {
                let proto = self.proto(rest.first().copied())?;
                let id = self.ctx.create_object(proto);
                self.ctx.pin(Value::object(id));
                if let Some(old) = self.names.insert(name.to_string(), id) {
                    self.ctx.unpin(Value::object(old));
                }
                Ok(format!("{} = {:?}", name, id))
            }
            ["set", obj, key, value] => {
                let target = Value::object(self.object(obj)?);
                let value = self.value(value)?;
                let key = self.ctx.key(key);
                js(self.ctx.set(target, key, value, false).map(|ok| ok.to_string()))
            }
            ["get", obj, key] => {
                let target = Value::object(self.object(obj)?);
                let key = self.ctx.key(key);
                let value = self.ctx.get(target, key).map_err(|e| e.to_string())?;
                Ok(self.show(value))
            }
            ["del", obj, key] => {
                let target = Value::object(self.object(obj)?);
                let key = self.ctx.key(key);
                js(self.ctx.delete(target, key).map(|ok| ok.to_string()))
            }
            ["has", obj, key] => {
                let target = Value::object(self.object(obj)?);
                let key = self.ctx.key(key);
                js(self.ctx.has(target, key).map(|ok| ok.to_string()))
            }
            ["keys", obj] => {
                let id = self.object(obj)?;
                let keys: Vec<_> = self
                    .ctx
                    .own_property_keys(id)
                    .into_iter()
                    .map(|k| self.ctx.key_name(k))
                    .collect();
                Ok(format!("[{}]", keys.join(", ")))
            }
            ["forin", obj] => {
                let id = self.object(obj)?;
                let keys: Vec<_> = self
                    .ctx
                    .for_in_keys(id)
                    .into_iter()
                    .map(|k| self.ctx.key_name(k))
                    .collect();
                Ok(format!("[{}]", keys.join(", ")))
            }
            ["proto", obj, proto] => {
                let id = self.object(obj)?;
                let proto = self.proto(Some(proto))?;
                js(self.ctx.set_prototype_of(id, proto).map(|ok| ok.to_string()))
            }
            ["shape", obj] => {
                let id = self.object(obj)?;
                Ok(format!("{:#?}", self.ctx.shape_of(id)))
            }
            ["freeze", obj] | ["seal", obj] => {
                let id = self.object(obj)?;
                let level = if words[0] == "freeze" {
                    IntegrityLevel::Frozen
                } else {
                    IntegrityLevel::Sealed
                };
                js(self.ctx.set_integrity_level(id, level).map(|ok| ok.to_string()))
            }
            ["track", obj] => {
                let id = self.object(obj)?;
                let marker = self.ctx.enable_change_tracking(id);
                self.markers.insert(obj.to_string(), marker);
                Ok("tracking".to_string())
            }
            ["marker", obj] => match self.markers.get(*obj) {
                Some(marker) if marker.has_changed() => Ok("changed".to_string()),
                Some(_) => Ok("unchanged".to_string()),
                None => Err(format!("'{}' is not tracked", obj)),
            },
            ["gc"] => {
                let stats = self.ctx.gc();
                Ok(format!("{:?}", stats))
            }
            _ => Err(format!("unknown command: {} (try 'help')", line)),
        }
    }
}

fn main() {
    env_logger::init();

    let config = ObjectModelConfig::from_env();
    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        // Run a command file
        run_file(&mut session, &args[1]);
    } else {
        // Interactive REPL
        run_repl(&mut session);
    }
}

fn run_file(session: &mut Session, filename: &str) {
    let source = match std::fs::read_to_string(filename) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", filename, e);
            std::process::exit(1);
        }
    };

    for (lineno, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match session.run(line) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("{}:{}: {}", filename, lineno + 1, e);
                std::process::exit(1);
            }
        }
    }
}

fn run_repl(session: &mut Session) {
    println!("hclass object model shell");
    println!("Type 'help' for commands, Ctrl+D to exit.\n");

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error starting line editor: {}", e);
            std::process::exit(1);
        }
    };

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match session.run(line) {
                    Ok(output) => println!("{}", output),
                    Err(e) => println!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }
}
