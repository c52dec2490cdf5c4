//! Attribute naming rules for the HTML and SVG spaces.

use serde::{Deserialize, Serialize};

/// Attribute space the converter is currently in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    #[default]
    Html,
    Svg,
}

/// Naming convention for element props handed to the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeNameCase {
    /// `className`, `htmlFor`, `strokeWidth`
    #[default]
    React,
    /// Attribute names as written in markup
    Html,
}

/// How one attribute maps onto the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Name as written in markup (lowercased in HTML space)
    pub attribute: String,
    /// Camel-cased property name used by React-like runtimes
    pub property: String,
    /// List values are joined with `", "` instead of `" "`
    pub comma_separated: bool,
    /// False for `data-*`, `aria-*` and unknown names, which keep their markup spelling
    pub known: bool,
}

impl PropertyInfo {
    /// Name to use under the given casing
    pub fn name(&self, case: AttributeNameCase) -> &str {
        match case {
            AttributeNameCase::React if self.known => &self.property,
            _ => &self.attribute,
        }
    }
}

const HTML_PROPERTIES: &[(&str, &str)] = &[
    ("accept-charset", "acceptCharset"),
    ("accesskey", "accessKey"),
    ("allowfullscreen", "allowFullScreen"),
    ("autocapitalize", "autoCapitalize"),
    ("autocomplete", "autoComplete"),
    ("autofocus", "autoFocus"),
    ("autoplay", "autoPlay"),
    ("cellpadding", "cellPadding"),
    ("cellspacing", "cellSpacing"),
    ("charset", "charSet"),
    ("class", "className"),
    ("classid", "classID"),
    ("colspan", "colSpan"),
    ("contenteditable", "contentEditable"),
    ("crossorigin", "crossOrigin"),
    ("datetime", "dateTime"),
    ("dirname", "dirName"),
    ("enctype", "encType"),
    ("enterkeyhint", "enterKeyHint"),
    ("for", "htmlFor"),
    ("formaction", "formAction"),
    ("frameborder", "frameBorder"),
    ("hreflang", "hrefLang"),
    ("http-equiv", "httpEquiv"),
    ("inputmode", "inputMode"),
    ("itemid", "itemID"),
    ("itemprop", "itemProp"),
    ("itemref", "itemRef"),
    ("itemscope", "itemScope"),
    ("itemtype", "itemType"),
    ("maxlength", "maxLength"),
    ("minlength", "minLength"),
    ("novalidate", "noValidate"),
    ("playsinline", "playsInline"),
    ("readonly", "readOnly"),
    ("referrerpolicy", "referrerPolicy"),
    ("rowspan", "rowSpan"),
    ("spellcheck", "spellCheck"),
    ("srcdoc", "srcDoc"),
    ("srclang", "srcLang"),
    ("srcset", "srcSet"),
    ("tabindex", "tabIndex"),
    ("usemap", "useMap"),
];

const SVG_PROPERTIES: &[(&str, &str)] = &[
    ("class", "className"),
    ("tabindex", "tabIndex"),
    ("xlink:actuate", "xLinkActuate"),
    ("xlink:arcrole", "xLinkArcrole"),
    ("xlink:href", "xLinkHref"),
    ("xlink:role", "xLinkRole"),
    ("xlink:show", "xLinkShow"),
    ("xlink:title", "xLinkTitle"),
    ("xlink:type", "xLinkType"),
    ("xml:base", "xmlBase"),
    ("xml:lang", "xmlLang"),
    ("xml:space", "xmlSpace"),
    ("xmlns:xlink", "xmlnsXLink"),
];

const HTML_COMMA_SEPARATED: &[&str] = &["accept", "coords"];

const SVG_COMMA_SEPARATED: &[&str] = &["g1", "g2", "glyph-name"];

/// Look up how `name` maps in `space`.
pub fn find(space: Space, name: &str) -> PropertyInfo {
    if name.starts_with("data-") || name.starts_with("aria-") || name == "role" {
        return passthrough(name);
    }

    match space {
        Space::Html => {
            let attribute = name.to_ascii_lowercase();
            let property = lookup(HTML_PROPERTIES, &attribute)
                .map(str::to_string)
                .unwrap_or_else(|| attribute.clone());
            PropertyInfo {
                comma_separated: HTML_COMMA_SEPARATED.contains(&attribute.as_str()),
                attribute,
                property,
                known: true,
            }
        }
        Space::Svg => {
            let property = match lookup(SVG_PROPERTIES, name) {
                Some(p) => p.to_string(),
                None if name.contains(':') => return passthrough(name),
                None => camel_case(name),
            };
            PropertyInfo {
                comma_separated: SVG_COMMA_SEPARATED.contains(&name),
                attribute: name.to_string(),
                property,
                known: true,
            }
        }
    }
}

fn passthrough(name: &str) -> PropertyInfo {
    PropertyInfo {
        attribute: name.to_string(),
        property: name.to_string(),
        comma_separated: false,
        known: false,
    }
}

fn lookup<'a>(table: &'a [(&'a str, &'a str)], attribute: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(attr, _)| *attr == attribute)
        .map(|(_, property)| *property)
}

/// `stroke-width` → `strokeWidth`; names without dashes are kept.
fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Join a multi-valued attribute the way the schema says.
pub fn join_tokens(info: &PropertyInfo, tokens: &[String]) -> String {
    if info.comma_separated {
        tokens.join(", ")
    } else {
        tokens.join(" ")
    }
}
