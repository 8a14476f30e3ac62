//! Fixed whitelist of standard-library type names.
//!
//! A method is only extractable if every type it mentions is a primitive
//! or one of these names; that keeps the emitted candidate units
//! compilable without any external classpath.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Core language types (java.lang).
pub const JAVA_LANG_CLASSES: [&str; 103] = [
    "AbstractMethodError",
    "Appendable",
    "ArithmeticException",
    "ArrayIndexOutOfBoundsException",
    "ArrayStoreException",
    "AssertionError",
    "AutoCloseable",
    "Boolean",
    "BootstrapMethodError",
    "Byte",
    "Character",
    "CharSequence",
    "Class",
    "ClassCastException",
    "ClassCircularityError",
    "ClassFormatError",
    "ClassLoader",
    "ClassNotFoundException",
    "ClassValue",
    "Cloneable",
    "CloneNotSupportedException",
    "Comparable",
    "Compiler",
    "Deprecated",
    "Double",
    "Enum",
    "EnumConstantNotPresentException",
    "Error",
    "Exception",
    "ExceptionInInitializerError",
    "Float",
    "FunctionalInterface",
    "IllegalAccessError",
    "IllegalAccessException",
    "IllegalArgumentException",
    "IllegalCallerException",
    "IllegalMonitorStateException",
    "IllegalStateException",
    "IllegalThreadStateException",
    "IncompatibleClassChangeError",
    "IndexOutOfBoundsException",
    "InheritableThreadLocal",
    "InstantiationError",
    "InstantiationException",
    "Integer",
    "InternalError",
    "InterruptedException",
    "Iterable",
    "LayerInstantiationException",
    "LinkageError",
    "Long",
    "Math",
    "Module",
    "ModuleLayer",
    "NegativeArraySizeException",
    "NoClassDefFoundError",
    "NoSuchFieldError",
    "NoSuchFieldException",
    "NoSuchMethodError",
    "NoSuchMethodException",
    "NullPointerException",
    "Number",
    "NumberFormatException",
    "Object",
    "OutOfMemoryError",
    "Override",
    "Package",
    "Process",
    "ProcessBuilder",
    "ProcessHandle",
    "Readable",
    "Record",
    "ReflectiveOperationException",
    "Runnable",
    "Runtime",
    "RuntimeException",
    "RuntimePermission",
    "SafeVarargs",
    "SecurityException",
    "SecurityManager",
    "Short",
    "StackOverflowError",
    "StackTraceElement",
    "StackWalker",
    "StrictMath",
    "String",
    "StringBuffer",
    "StringBuilder",
    "SuppressWarnings",
    "System",
    "Thread",
    "ThreadDeath",
    "ThreadGroup",
    "ThreadLocal",
    "Throwable",
    "TypeNotPresentException",
    "UnknownError",
    "UnsatisfiedLinkError",
    "UnsupportedClassVersionError",
    "UnsupportedOperationException",
    "VerifyError",
    "VirtualMachineError",
    "Void",
];

/// Generic-collection package types (java.util).
pub const JAVA_UTIL_CLASSES: [&str; 105] = [
    "AbstractCollection",
    "AbstractList",
    "AbstractMap",
    "AbstractQueue",
    "AbstractSequentialList",
    "AbstractSet",
    "ArrayDeque",
    "ArrayList",
    "Arrays",
    "Base64",
    "BitSet",
    "Calendar",
    "Collection",
    "Collections",
    "Comparator",
    "ConcurrentModificationException",
    "Currency",
    "Date",
    "Deque",
    "Dictionary",
    "DoubleSummaryStatistics",
    "DuplicateFormatFlagsException",
    "EmptyStackException",
    "Enumeration",
    "EnumMap",
    "EnumSet",
    "EventListener",
    "EventListenerProxy",
    "EventObject",
    "FormatFlagsConversionMismatchException",
    "Formattable",
    "Formatter",
    "FormatterClosedException",
    "GregorianCalendar",
    "HashMap",
    "HashSet",
    "Hashtable",
    "HexFormat",
    "IdentityHashMap",
    "IllegalFormatCodePointException",
    "IllegalFormatConversionException",
    "IllegalFormatException",
    "IllegalFormatFlagsException",
    "IllegalFormatPrecisionException",
    "IllegalFormatWidthException",
    "IllformedLocaleException",
    "InputMismatchException",
    "IntSummaryStatistics",
    "InvalidPropertiesFormatException",
    "Iterator",
    "LinkedHashMap",
    "LinkedHashSet",
    "LinkedList",
    "List",
    "ListIterator",
    "ListResourceBundle",
    "Locale",
    "LongSummaryStatistics",
    "Map",
    "MissingFormatArgumentException",
    "MissingFormatWidthException",
    "MissingResourceException",
    "NavigableMap",
    "NavigableSet",
    "NoSuchElementException",
    "Objects",
    "Observable",
    "Observer",
    "Optional",
    "OptionalDouble",
    "OptionalInt",
    "OptionalLong",
    "PrimitiveIterator",
    "PriorityQueue",
    "Properties",
    "PropertyPermission",
    "PropertyResourceBundle",
    "Queue",
    "Random",
    "RandomAccess",
    "ResourceBundle",
    "Scanner",
    "ServiceConfigurationError",
    "ServiceLoader",
    "Set",
    "SimpleTimeZone",
    "SortedMap",
    "SortedSet",
    "Spliterator",
    "Spliterators",
    "SplittableRandom",
    "Stack",
    "StringJoiner",
    "StringTokenizer",
    "Timer",
    "TimerTask",
    "TimeZone",
    "TooManyListenersException",
    "TreeMap",
    "TreeSet",
    "UnknownFormatConversionException",
    "UnknownFormatFlagsException",
    "UUID",
    "Vector",
    "WeakHashMap",
];

static PERMITTED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    JAVA_LANG_CLASSES
        .iter()
        .chain(JAVA_UTIL_CLASSES.iter())
        .copied()
        .collect()
});

/// Whether a simple type name may appear in an extractable method.
pub fn is_permitted(name: &str) -> bool {
    PERMITTED.contains(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_types_permitted() {
        assert!(is_permitted("String"));
        assert!(is_permitted("Integer"));
        assert!(is_permitted("HashMap"));
        assert!(is_permitted("Set"));
    }

    #[test]
    fn test_foreign_types_rejected() {
        assert!(!is_permitted("Path"));
        assert!(!is_permitted("BigDecimal"));
        assert!(!is_permitted("MyWidget"));
    }
}
