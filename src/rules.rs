//! Static rule tables mapping base-class names to structural obligations.
//!
//! The validator never imports or executes host-framework code, so every
//! piece of semantic knowledge about what a valid component looks like is
//! encoded declaratively here. Lookups are by exact base-name string;
//! legacy short aliases map to the same entries as the canonical `Base*`
//! names. This is the single place to extend when the framework contract
//! evolves.

use phf::phf_map;

/// Plugin entry file name.
pub const ENTRY_FILE: &str = "plugin.py";
/// Plugin manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Base class of the plugin's registration class.
pub const PLUGIN_BASE: &str = "BasePlugin";
/// Identity attribute on the registration class.
pub const PLUGIN_NAME_ATTR: &str = "plugin_name";
/// The registration method enumerating components.
pub const REGISTRATION_METHOD: &str = "get_components";
/// Attribute on the registration class listing config classes.
pub const CONFIGS_ATTR: &str = "configs";
/// Base class every config class must derive from.
pub const CONFIG_BASE: &str = "BaseConfig";
/// Name attribute on config classes.
pub const CONFIG_NAME_ATTR: &str = "config_name";
/// Base class of nested config section classes.
pub const SECTION_BASE: &str = "SectionBase";

/// Parameter requirement inside a method signature spec.
#[derive(Debug, Clone, Copy)]
pub struct ParamReq {
    pub name: &'static str,
    pub annotation: &'static str,
    pub optional: bool,
}

/// Parameter shape of a required method.
#[derive(Debug, Clone, Copy)]
pub enum ParamSpec {
    /// Accepts `*args, **kwargs`; parameter checks are skipped entirely.
    Variable,
    /// A fixed ordered parameter list (excluding the receiver).
    Fixed(&'static [ParamReq]),
}

/// Canonical signature of a required method.
#[derive(Debug, Clone, Copy)]
pub struct MethodSpec {
    pub name: &'static str,
    pub params: ParamSpec,
    pub return_type: &'static str,
    pub is_async: bool,
}

impl MethodSpec {
    /// Render the expected `def` line, e.g.
    /// `async def execute(self, message_text: str)`.
    pub fn render_signature(&self) -> String {
        let prefix = if self.is_async { "async " } else { "" };
        let params = match self.params {
            ParamSpec::Variable => "self, *args, **kwargs".to_string(),
            ParamSpec::Fixed(reqs) => {
                let mut parts = vec!["self".to_string()];
                for req in reqs {
                    parts.push(format!("{}: {}", req.name, req.annotation));
                }
                parts.join(", ")
            }
        };
        format!("{}def {}({})", prefix, self.name, params)
    }

    /// Required (non-optional) parameter names.
    pub fn required_param_names(&self) -> Vec<&'static str> {
        match self.params {
            ParamSpec::Variable => Vec::new(),
            ParamSpec::Fixed(reqs) => reqs
                .iter()
                .filter(|r| !r.optional)
                .map(|r| r.name)
                .collect(),
        }
    }

    /// Parameter fragments for signature rewrites, `name: Type` shaped.
    pub fn param_fragments(&self) -> Vec<String> {
        match self.params {
            ParamSpec::Variable => Vec::new(),
            ParamSpec::Fixed(reqs) => reqs
                .iter()
                .map(|r| format!("{}: {}", r.name, r.annotation))
                .collect(),
        }
    }
}

/// Requirements for one recognized base class.
#[derive(Debug)]
pub struct RuleEntry {
    /// Canonical base-class name (reported in messages).
    pub canonical: &'static str,
    /// Class attributes that must be present and non-empty.
    pub required_attributes: &'static [&'static str],
    /// Methods that must be implemented.
    pub required_methods: &'static [&'static str],
    /// Signature specs for required methods. A method listed in
    /// `required_methods` without a spec here gets an existence check only.
    pub signatures: &'static [MethodSpec],
}

impl RuleEntry {
    /// Signature spec for a method, if strictness is defined for it.
    pub fn signature(&self, method: &str) -> Option<&'static MethodSpec> {
        self.signatures.iter().find(|s| s.name == method)
    }
}

static ACTION: RuleEntry = RuleEntry {
    canonical: "BaseAction",
    required_attributes: &["action_name", "action_description"],
    required_methods: &["execute"],
    signatures: &[MethodSpec {
        name: "execute",
        params: ParamSpec::Variable,
        return_type: "tuple[bool, str]",
        is_async: true,
    }],
};

static COMMAND: RuleEntry = RuleEntry {
    canonical: "BaseCommand",
    required_attributes: &["command_name", "command_description"],
    required_methods: &["execute"],
    signatures: &[MethodSpec {
        name: "execute",
        params: ParamSpec::Fixed(&[ParamReq {
            name: "message_text",
            annotation: "str",
            optional: false,
        }]),
        return_type: "tuple[bool, str]",
        is_async: true,
    }],
};

static TOOL: RuleEntry = RuleEntry {
    canonical: "BaseTool",
    required_attributes: &["tool_name", "tool_description"],
    required_methods: &["execute"],
    signatures: &[MethodSpec {
        name: "execute",
        params: ParamSpec::Variable,
        return_type: "tuple[bool, str | dict]",
        is_async: true,
    }],
};

static EVENT_HANDLER: RuleEntry = RuleEntry {
    canonical: "BaseEventHandler",
    required_attributes: &["handler_name", "handler_description"],
    required_methods: &["execute"],
    signatures: &[MethodSpec {
        name: "execute",
        params: ParamSpec::Fixed(&[ParamReq {
            name: "kwargs",
            annotation: "dict | None",
            optional: false,
        }]),
        return_type: "tuple[bool, bool, str | None]",
        is_async: true,
    }],
};

static ADAPTER: RuleEntry = RuleEntry {
    canonical: "BaseAdapter",
    required_attributes: &["adapter_name", "adapter_description"],
    required_methods: &["from_platform_message", "get_bot_info"],
    signatures: &[
        MethodSpec {
            name: "from_platform_message",
            params: ParamSpec::Fixed(&[ParamReq {
                name: "raw",
                annotation: "Any",
                optional: false,
            }]),
            return_type: "MessageEnvelope",
            is_async: true,
        },
        MethodSpec {
            name: "get_bot_info",
            params: ParamSpec::Fixed(&[]),
            return_type: "dict[str, Any]",
            is_async: true,
        },
    ],
};

static CHATTER: RuleEntry = RuleEntry {
    canonical: "BaseChatter",
    required_attributes: &["chatter_name", "chatter_description"],
    required_methods: &["execute"],
    signatures: &[MethodSpec {
        name: "execute",
        params: ParamSpec::Fixed(&[]),
        return_type: "AsyncGenerator",
        is_async: true,
    }],
};

static COLLECTION: RuleEntry = RuleEntry {
    canonical: "BaseCollection",
    required_attributes: &["collection_name", "collection_description"],
    required_methods: &["get_contents"],
    signatures: &[MethodSpec {
        name: "get_contents",
        params: ParamSpec::Fixed(&[]),
        return_type: "list[str]",
        is_async: true,
    }],
};

static SERVICE: RuleEntry = RuleEntry {
    canonical: "BaseService",
    required_attributes: &["service_name", "service_description"],
    required_methods: &[],
    signatures: &[],
};

static ROUTER: RuleEntry = RuleEntry {
    canonical: "BaseRouterComponent",
    required_attributes: &["router_name", "router_description"],
    required_methods: &["register_endpoints"],
    signatures: &[MethodSpec {
        name: "register_endpoints",
        params: ParamSpec::Fixed(&[]),
        return_type: "None",
        is_async: false,
    }],
};

/// Base-class name (canonical or alias) to requirement set.
static RULE_TABLE: phf::Map<&'static str, &'static RuleEntry> = phf_map! {
    "Action" => &ACTION,
    "BaseAction" => &ACTION,
    "Command" => &COMMAND,
    "BaseCommand" => &COMMAND,
    "Tool" => &TOOL,
    "BaseTool" => &TOOL,
    "EventHandler" => &EVENT_HANDLER,
    "BaseEventHandler" => &EVENT_HANDLER,
    "Adapter" => &ADAPTER,
    "BaseAdapter" => &ADAPTER,
    "Chatter" => &CHATTER,
    "BaseChatter" => &CHATTER,
    "Collection" => &COLLECTION,
    "BaseCollection" => &COLLECTION,
    "Service" => &SERVICE,
    "BaseService" => &SERVICE,
    "Router" => &ROUTER,
    "BaseRouterComponent" => &ROUTER,
};

/// Look up the requirements for a base-class name token.
pub fn lookup(base_class_name: &str) -> Option<&'static RuleEntry> {
    RULE_TABLE.get(base_class_name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_share_entries() {
        let short = lookup("Action").unwrap();
        let long = lookup("BaseAction").unwrap();
        assert!(std::ptr::eq(short, long));
    }

    #[test]
    fn test_unknown_base_is_absent() {
        assert!(lookup("BaseWidget").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn test_every_signature_belongs_to_a_required_method() {
        for entry in [
            &ACTION, &COMMAND, &TOOL, &EVENT_HANDLER, &ADAPTER, &CHATTER, &COLLECTION, &SERVICE,
            &ROUTER,
        ] {
            for spec in entry.signatures {
                assert!(
                    entry.required_methods.contains(&spec.name),
                    "{} has a signature for {} which is not required",
                    entry.canonical,
                    spec.name
                );
            }
        }
    }

    #[test]
    fn test_render_signature() {
        let spec = lookup("BaseCommand").unwrap().signature("execute").unwrap();
        assert_eq!(
            spec.render_signature(),
            "async def execute(self, message_text: str)"
        );
        let spec = lookup("BaseAction").unwrap().signature("execute").unwrap();
        assert_eq!(
            spec.render_signature(),
            "async def execute(self, *args, **kwargs)"
        );
        let spec = lookup("Router").unwrap().signature("register_endpoints").unwrap();
        assert_eq!(spec.render_signature(), "def register_endpoints(self)");
    }
}
