/// A value whose human-readable string leaves can be translated in place.
///
/// Implementations push a mutable reference to every natural-language leaf in
/// structural order: fields in declaration order, sequences element by
/// element. Numbers, booleans, enums and opaque identifiers are skipped, and
/// absent optional fields contribute nothing.
pub trait Translatable {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>);
}

impl Translatable for String {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        out.push(self);
    }
}

impl<T: Translatable> Translatable for Vec<T> {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        for item in self.iter_mut() {
            item.text_fields(out);
        }
    }
}

impl<T: Translatable> Translatable for Option<T> {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        if let Some(value) = self {
            value.text_fields(out);
        }
    }
}
