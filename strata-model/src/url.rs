use std::fmt;
use std::rc::Rc;

/// A resource location: fixed, or computed from the owner.
pub enum UrlSource<T> {
    Fixed(String),
    Computed(Rc<dyn Fn(&T) -> String>),
}

impl<T> UrlSource<T> {
    pub fn computed(f: impl Fn(&T) -> String + 'static) -> Self {
        Self::Computed(Rc::new(f))
    }

    pub fn resolve(&self, owner: &T) -> String {
        match self {
            Self::Fixed(url) => url.clone(),
            Self::Computed(f) => f(owner),
        }
    }
}

impl<T> Clone for UrlSource<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(url) => Self::Fixed(url.clone()),
            Self::Computed(f) => Self::Computed(Rc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for UrlSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(url) => f.debug_tuple("Fixed").field(url).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Joins a base location and an id with exactly one `/`.
pub(crate) fn join_id(base: String, id: &str) -> String {
    let mut url = base;
    if !url.is_empty() && !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(&urlencoding::encode(id));
    url
}
